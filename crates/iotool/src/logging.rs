//! Diagnostic logging setup.
//!
//! Logging is off unless `IOTOOL_LOG` holds a filter directive. Events go to
//! `IOTOOL_LOG_FILE` when set, otherwise to stderr.

use std::fmt;
use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::config::Config;

#[derive(Debug)]
pub enum LogInitError {
    Filter { directive: String, message: String },
    File { path: PathBuf, source: io::Error },
    /// A global subscriber was already installed.
    AlreadySet,
}

impl fmt::Display for LogInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Filter { directive, message } => {
                write!(f, "invalid log filter {directive:?}: {message}")
            }
            Self::File { path, source } => {
                write!(f, "cannot open log file {}: {source}", path.display())
            }
            Self::AlreadySet => write!(f, "a log subscriber is already installed"),
        }
    }
}

impl std::error::Error for LogInitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::File { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Install the global subscriber described by `config`.
///
/// Returns `Ok(false)` when logging is not enabled.
pub fn init(config: &Config) -> Result<bool, LogInitError> {
    let Some(directive) = config.log_filter.as_deref() else {
        return Ok(false);
    };
    let filter = EnvFilter::try_new(directive).map_err(|err| LogInitError::Filter {
        directive: directive.to_string(),
        message: err.to_string(),
    })?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    let installed = match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| LogInitError::File {
                    path: path.clone(),
                    source,
                })?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(io::stderr).try_init(),
    };
    installed.map_err(|_| LogInitError::AlreadySet)?;
    Ok(true)
}
