//! Per-session checkpoint storage.
//!
//! A [`Checkpointer`] persists one `ConversationState` snapshot per
//! session key. `save` replaces the prior snapshot entirely and `load` of
//! an unknown key yields a fresh default state, which is how a brand-new
//! conversation begins. Two backends are provided: an in-process
//! [`MemoryCheckpointer`] and a JSON-file-per-session
//! [`FileCheckpointer`] with file locking for concurrent access.

pub mod checkpoint;
pub mod error;
pub mod file;
pub mod key;
pub mod memory;

pub use {
    checkpoint::Checkpointer,
    error::{Error, Result},
    file::FileCheckpointer,
    key::SessionKey,
    memory::MemoryCheckpointer,
};
