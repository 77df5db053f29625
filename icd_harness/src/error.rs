//! Harness error types.

use std::path::PathBuf;

use thiserror::Error;

use test_icd::error::IcdError;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Icd(#[from] IcdError),

    #[error("scenario {name:?}: {reason}")]
    Scenario { name: String, reason: String },

    #[error("no driver registered at index {0}")]
    NoSuchDriver(usize),

    #[error("cannot register driver {0}: handle namespaces exhausted")]
    TooManyDrivers(usize),
}

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, HarnessError>;
