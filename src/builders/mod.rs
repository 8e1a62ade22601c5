//! Builders
//!
//! Fluent builder patterns for client configuration.

pub mod config;

pub use config::{auth_client_config, ClientConfigBuilder};
