//! Observability
//!
//! Structured logging via `tracing`.

pub mod logging;
pub mod transport;

pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use transport::LoggingTransport;
