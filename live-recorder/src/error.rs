//! Application-wide error types.

use std::path::{Path, PathBuf};

use platforms_resolver::{ErrorKind, ResolverError};
use thiserror::Error;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Network hiccup while resolving a room; retried on the next poll.
    #[error("Resolution failed: {0}")]
    ResolutionTransient(String),

    /// Unsupported platform or unusable response; retrying will not help.
    #[error("Resolution failed permanently: {0}")]
    ResolutionPermanent(String),

    #[error("Failed to spawn capture process: {0}")]
    ProcessSpawn(String),

    #[error("Capture process exited abnormally (code {code:?})")]
    ProcessAbnormalExit { code: Option<i32> },

    #[error("Disk space exhausted: {available_gib:.2} GiB available, {threshold_gib:.2} GiB required")]
    DiskSpaceExhausted {
        available_gib: f64,
        threshold_gib: f64,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The target is already covered by an existing recording.
    #[error("Duplicate recording: {reason}")]
    Duplicate { reason: &'static str },

    #[error("Invalid state transition: cannot transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IO error while {op} at {}: {source}", path.display())]
    IoPath {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn io_path(op: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::IoPath {
            op,
            path: path.to_path_buf(),
            source,
        }
    }

    /// Whether the failure should be retried on a later poll.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ResolutionTransient(_))
    }
}

impl From<ResolverError> for Error {
    fn from(err: ResolverError) -> Self {
        match err.kind() {
            ErrorKind::Transient => Self::ResolutionTransient(err.to_string()),
            ErrorKind::Permanent | ErrorKind::Unsupported => {
                Self::ResolutionPermanent(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolver_error_classification() {
        let transient: Error = ResolverError::Timeout.into();
        assert!(transient.is_transient());

        let permanent: Error = ResolverError::StreamerNotFound.into();
        assert!(matches!(permanent, Error::ResolutionPermanent(_)));

        let unsupported: Error = ResolverError::PlatformNotSupported("example".into()).into();
        assert!(matches!(unsupported, Error::ResolutionPermanent(_)));
    }

    #[test]
    fn test_io_path_message() {
        let err = Error::io_path(
            "writing recordings",
            Path::new("/tmp/x.json"),
            std::io::Error::other("boom"),
        );
        let msg = err.to_string();
        assert!(msg.contains("writing recordings"));
        assert!(msg.contains("/tmp/x.json"));
    }
}
