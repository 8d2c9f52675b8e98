//! Tracing subscriber setup.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{ConfigError, LogOutput, ServerConfig};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured log level. Console output
/// is human-readable; file output is newline-delimited JSON, truncating any
/// existing file.
pub fn init_tracing(config: &ServerConfig) -> Result<(), ConfigError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    match &config.log_output {
        LogOutput::Console => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
        LogOutput::File(path) => {
            let file = std::fs::File::create(path).map_err(|source| ConfigError::LogFile {
                path: path.clone(),
                source,
            })?;
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_ansi(false)
                        .with_writer(Arc::new(file)),
                )
                .init();
        }
    }

    Ok(())
}
