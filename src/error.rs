//! Error types for netbar.
//!
//! Reader failures never leave the sampling cycle; they are logged and the
//! affected source keeps its previous value. `ConfigError` is only returned
//! when a config file was explicitly requested.

use std::path::PathBuf;
use thiserror::Error;

/// Failure while reading one raw measurement.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed {what}: {reason}")]
    Parse {
        what: &'static str,
        reason: String,
    },

    #[error("{0} unavailable")]
    Unavailable(&'static str),

    #[error("no result from {0} yet")]
    NotReady(&'static str),

    #[error("command {command} failed: {reason}")]
    Command {
        command: String,
        reason: String,
    },
}

impl SourceError {
    /// Shorthand for an I/O failure on a given path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Shorthand for a parse failure.
    pub fn parse(what: &'static str, reason: impl Into<String>) -> Self {
        Self::Parse {
            what,
            reason: reason.into(),
        }
    }
}

/// Failure while loading an explicitly requested config file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Misuse of the sampling scheduler.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("scheduler started outside a tokio runtime")]
    NoRuntime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_error_messages() {
        let err = SourceError::parse("/proc/stat", "missing cpu line");
        assert_eq!(err.to_string(), "malformed /proc/stat: missing cpu line");

        let err = SourceError::Unavailable("internal battery");
        assert_eq!(err.to_string(), "internal battery unavailable");

        let err = SourceError::NotReady("router prober");
        assert_eq!(err.to_string(), "no result from router prober yet");
    }

    #[test]
    fn io_error_keeps_source() {
        use std::error::Error as _;
        let err = SourceError::io(
            "/proc/meminfo",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.to_string().contains("/proc/meminfo"));
        assert!(err.source().is_some());
    }
}
