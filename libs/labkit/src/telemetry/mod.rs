//! Logging bootstrap and the per-request trace span.

pub mod config;
pub mod init;
pub mod span;

pub use config::{LogFormat, LoggingConfig};
pub use init::{LoggingError, init_logging};
pub use span::trace_layer;
