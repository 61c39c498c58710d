//! Shared domain types used across all palaver crates.

pub mod types;

pub use types::{Category, ConversationState, Role, TurnMessage};
