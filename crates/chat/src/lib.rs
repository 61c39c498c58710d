//! The conversational orchestration engine.
//!
//! One [`ChatEngine::process_query`] call runs one turn: load the
//! session's state, classify the query, dispatch to the matching domain
//! handler, compose the result into user-facing text, persist, reply.
//! The traversal is a fixed four-node state machine; every reachable node
//! produces a result, so a turn always ends with readable text.

pub mod engine;
pub mod error;
pub mod handlers;

pub use {
    engine::{COULD_NOT_PROCESS, ChatEngine, HANDLER_FAILED},
    error::{Error, Result},
    handlers::{CompletionHandler, DomainHandler, TurnConfig},
};
