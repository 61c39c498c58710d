//! Query classification.
//!
//! The [`Router`] asks the external classifier which of the two categories
//! a query belongs to, normalizes whatever comes back onto the closed
//! [`palaver_common::Category`] set, and falls back to the generic
//! category on any failure. Classification never raises to its caller.

pub mod router;

pub use router::{DEFAULT_CLASSIFY_TIMEOUT, Router, RoutingDecision};
