//! Error types for the cache subsystem
//!
//! Mutations (`save`, `invalidate`, `clear_all`) surface these errors to the
//! caller. Read faults are reported as [`CacheError::CorruptEntry`] internally
//! and downgraded to a cache miss before they reach the caller.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors that can occur when constructing or mutating a cache
#[derive(Debug, Error)]
pub enum CacheError {
    /// The storage root is missing, not a directory, or not writable
    #[error("Invalid cache configuration for {}: {reason}", path.display())]
    Configuration { path: PathBuf, reason: String },

    /// A filesystem operation failed while mutating the cache
    #[error("Cache I/O failed for {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A payload or envelope could not be serialized
    #[error("Failed to serialize cache entry: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored entry could not be read back
    #[error("Corrupt cache entry at {}: {reason}", path.display())]
    CorruptEntry { path: PathBuf, reason: String },

    /// The logical key is not usable
    #[error("Invalid cache key: {0}")]
    InvalidKey(String),
}

impl CacheError {
    pub(crate) fn configuration(path: &Path, reason: impl Into<String>) -> Self {
        CacheError::Configuration {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        CacheError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn corrupt(path: &Path, reason: impl ToString) -> Self {
        CacheError::CorruptEntry {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_message_names_path() {
        let err = CacheError::configuration(Path::new("/tmp/kudos"), "not a directory");
        let message = err.to_string();
        assert!(message.contains("/tmp/kudos"));
        assert!(message.contains("not a directory"));
    }

    #[test]
    fn test_io_error_keeps_source() {
        let err = CacheError::io(
            Path::new("/tmp/kudos/abc.json"),
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        let source = std::error::Error::source(&err).expect("Io should carry a source");
        assert_eq!(source.to_string(), "denied");
    }
}
