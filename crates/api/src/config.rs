use std::path::PathBuf;
use std::time::Duration;

/// Where log records are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    /// Human-readable records on stderr.
    Console,
    /// Newline-delimited JSON records in the given file.
    File(PathBuf),
}

/// Invalid configuration, detected at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got '{value}'")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("Unable to create log file {path}: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8080`).
    pub port: u16,
    /// Root of the `<channel>/<topic>/<name>.lua` tree (default: `./scripts`).
    pub script_root: PathBuf,
    /// Per-execution time limit in whole seconds (default: `15`).
    pub execution_timeout_secs: u64,
    /// Capacity of each event queue (default: `1024`).
    pub queue_capacity: usize,
    /// Default `EnvFilter` directive when `RUST_LOG` is unset (default: `info`).
    pub log_level: String,
    /// Log destination (default: file `activity.log`).
    pub log_output: LogOutput,
}

impl ServerConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                  | Default        |
    /// |--------------------------|----------------|
    /// | `HOST`                   | `0.0.0.0`      |
    /// | `PORT`                   | `8080`         |
    /// | `SCRIPT_ROOT`            | `./scripts`    |
    /// | `EXECUTION_TIMEOUT_SECS` | `15`           |
    /// | `QUEUE_CAPACITY`         | `1024`         |
    /// | `LOG_LEVEL`              | `info`         |
    /// | `LOG_VERBOSE`            | `false`        |
    /// | `LOG_FILE`               | `activity.log` |
    ///
    /// `LOG_VERBOSE=true` sends logs to the console instead of `LOG_FILE`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        let host = var("HOST", "0.0.0.0");
        let port = parse("PORT", var("PORT", "8080"), "a valid port number")?;
        let script_root = PathBuf::from(var("SCRIPT_ROOT", "./scripts"));

        let execution_timeout_secs: u64 = parse(
            "EXECUTION_TIMEOUT_SECS",
            var("EXECUTION_TIMEOUT_SECS", "15"),
            "a positive number of seconds",
        )?;
        if execution_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "EXECUTION_TIMEOUT_SECS",
                expected: "a positive number of seconds",
                value: "0".into(),
            });
        }

        let queue_capacity: usize = parse(
            "QUEUE_CAPACITY",
            var("QUEUE_CAPACITY", "1024"),
            "a positive integer",
        )?;
        if queue_capacity == 0 {
            return Err(ConfigError::Invalid {
                var: "QUEUE_CAPACITY",
                expected: "a positive integer",
                value: "0".into(),
            });
        }

        let log_level = var("LOG_LEVEL", "info");
        let verbose: bool = parse(
            "LOG_VERBOSE",
            var("LOG_VERBOSE", "false"),
            "'true' or 'false'",
        )?;
        let log_output = if verbose {
            LogOutput::Console
        } else {
            LogOutput::File(PathBuf::from(var("LOG_FILE", "activity.log")))
        };

        Ok(Self {
            host,
            port,
            script_root,
            execution_timeout_secs,
            queue_capacity,
            log_level,
            log_output,
        })
    }

    pub fn execution_timeout(&self) -> Duration {
        Duration::from_secs(self.execution_timeout_secs)
    }
}

fn parse<T: std::str::FromStr>(
    var: &'static str,
    value: String,
    expected: &'static str,
) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid {
            var,
            expected,
            value,
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
