//! Configuration schema and loading for palaver.
//!
//! Config lives in `palaver.toml`, discovered project-local first and then
//! in the user config directory. Everything has a default, so running with
//! no config file at all is fine.

pub mod loader;
pub mod schema;

pub use {
    loader::{discover_and_load, load_config},
    schema::{
        ChatConfig, PalaverConfig, ProviderConfig, RoutingConfig, SessionBackend, SessionsConfig,
    },
};
