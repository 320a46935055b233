//! Domain Errors
//!
//! Failure conditions shared across layers. None of them is fatal to the
//! process: each one aborts at most the current reconciliation pass.

use thiserror::Error;

/// A monitor range could not be turned into an address sequence.
///
/// Aborts the scan of that range only.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScanError {
    #[error("invalid address {0:?}")]
    InvalidAddress(String),
    #[error("invalid range {start} - {end}")]
    InvalidRange { start: String, end: String },
}

/// DNS lookup failure. The affected record is retried on the next pass.
#[derive(Debug, Clone, Error)]
#[error("unable to resolve {host}: {reason}")]
pub struct ResolveError {
    pub host: String,
    pub reason: String,
}

impl ResolveError {
    pub fn new(host: impl Into<String>, reason: impl ToString) -> Self {
        Self {
            host: host.into(),
            reason: reason.to_string(),
        }
    }
}

/// The routing model could not be rendered to configuration text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("base domain {0:?} is not a valid SNI suffix")]
    InvalidBaseDomain(String),
    #[error("port 0 in range {0}")]
    InvalidPort(String),
}

/// The config store collaborator failed to persist a configuration.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("config store rejected update: {0}")]
    Rejected(String),
}
