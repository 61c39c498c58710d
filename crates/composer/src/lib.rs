//! Response composition: turns raw handler output into polished
//! user-facing prose.
//!
//! Composition is pure and total. Every stage maps arbitrary text to
//! displayable text without failing, and the full pipeline is idempotent:
//! `compose(compose(x)) == compose(x)` for any input.

pub mod pipeline;

pub use pipeline::{NO_RESPONSE_DATA, compose};
