//! Global subscriber installation

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use super::config::{LogFormat, LoggingConfig};

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("invalid log filter '{directive}': {source}")]
    Filter {
        directive: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },
    #[error("failed to install global subscriber: {0}")]
    Install(#[from] tracing_subscriber::util::TryInitError),
}

/// `RUST_LOG` wins over the configured directive.
///
/// # Errors
/// Returns `LoggingError::Filter` when the configured directive does not parse.
pub fn build_filter(cfg: &LoggingConfig) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&cfg.level).map_err(|source| LoggingError::Filter {
        directive: cfg.level.clone(),
        source,
    })
}

/// Install the process-wide subscriber. Call once, before serving.
///
/// # Errors
/// Fails on an invalid filter directive or when a subscriber is already installed.
pub fn init_logging(cfg: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = build_filter(cfg)?;
    let registry = tracing_subscriber::registry().with(filter);

    match cfg.format {
        LogFormat::Text => registry
            .with(fmt::layer().with_ansi(cfg.ansi).with_target(true))
            .try_init()?,
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(true)
                    .with_span_list(false),
            )
            .try_init()?,
    }
    Ok(())
}
