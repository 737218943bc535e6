//! Error types shared by the unik crates
//!
//! Errors carry the file or component they relate to so that startup failures
//! can be diagnosed from a single log line.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for shared unik operations
#[derive(Debug, Error)]
pub enum Error {
    /// The registry configuration could not be parsed or is invalid
    #[error("configuration error in {path}: {message}")]
    Config {
        /// Path of the offending file, or `<inline>` for in-memory sources
        path: String,
        /// Description of what's invalid
        message: String,
    },

    /// Reading a file from disk failed
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path of the file being read
        path: PathBuf,
        /// The underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Telemetry could not be initialized
    #[error("telemetry error: {0}")]
    Telemetry(#[from] crate::telemetry::TelemetryError),
}

impl Error {
    /// Create a configuration error for an in-memory source
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            path: "<inline>".to_string(),
            message: msg.into(),
        }
    }

    /// Create a configuration error for a file
    pub fn config_in(path: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Config {
            path: path.into(),
            message: msg.into(),
        }
    }
}
