//! Storage error types.

use std::time::Duration;

use thiserror::Error;

/// Storage operation errors.
///
/// Every provider SDK error is converted into one of these variants at the
/// adapter boundary.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// Provider session could not be established.
    #[error("storage initialization failed: {0}")]
    Initialization(String),

    /// Object key failed validation; raised before any provider call.
    #[error("invalid storage key '{key}': {reason}")]
    InvalidKey {
        /// The rejected key.
        key: String,
        /// Why the key was rejected.
        reason: String,
    },

    /// Object not found in storage.
    #[error("file not found: {key}")]
    NotFound {
        /// Storage key that was not found.
        key: String,
    },

    /// Presign operation not supported by provider.
    #[error("presign operation not supported by storage provider")]
    PresignNotSupported,

    /// Storage provider configuration error.
    #[error("storage configuration error: {0}")]
    Configuration(String),

    /// Provider call did not finish in time.
    #[error("storage operation '{operation}' timed out after {after:?}")]
    Timeout {
        /// Name of the operation.
        operation: &'static str,
        /// Configured timeout.
        after: Duration,
    },

    /// Any other provider failure.
    #[error("storage operation failed: {0}")]
    Operation(String),
}

impl StorageError {
    /// Create an initialization error.
    #[must_use]
    pub fn initialization(msg: impl Into<String>) -> Self {
        Self::Initialization(msg.into())
    }

    /// Create an invalid key error.
    #[must_use]
    pub fn invalid_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create a not found error.
    #[must_use]
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Create a configuration error.
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create an operation error.
    #[must_use]
    pub fn operation(msg: impl Into<String>) -> Self {
        Self::Operation(msg.into())
    }

    /// Convert a provider error, attributing not-found errors to `key`.
    #[must_use]
    pub fn for_key(err: opendal::Error, key: &str) -> Self {
        match err.kind() {
            opendal::ErrorKind::NotFound => Self::not_found(key),
            _ => Self::from(err),
        }
    }

    /// Whether this error means the object does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Provider errors with no key in scope. A not-found here is reported as an
/// operation failure; use [`StorageError::for_key`] when the key is known.
impl From<opendal::Error> for StorageError {
    fn from(err: opendal::Error) -> Self {
        match err.kind() {
            opendal::ErrorKind::Unsupported => Self::PresignNotSupported,
            opendal::ErrorKind::ConfigInvalid | opendal::ErrorKind::PermissionDenied => {
                Self::Configuration(err.to_string())
            }
            _ => Self::Operation(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_key_maps_not_found() {
        let err = opendal::Error::new(opendal::ErrorKind::NotFound, "missing");
        let mapped = StorageError::for_key(err, "docs/a.pdf");
        assert!(matches!(mapped, StorageError::NotFound { ref key } if key == "docs/a.pdf"));
        assert!(mapped.is_not_found());
    }

    #[test]
    fn test_from_unexpected_is_operation() {
        let err = opendal::Error::new(opendal::ErrorKind::Unexpected, "boom");
        assert!(matches!(
            StorageError::from(err),
            StorageError::Operation(_)
        ));
    }

    #[test]
    fn test_from_not_found_carries_no_key() {
        let err = opendal::Error::new(opendal::ErrorKind::NotFound, "bucket missing");
        let mapped = StorageError::from(err);
        assert!(matches!(mapped, StorageError::Operation(ref msg) if msg.contains("bucket missing")));
        assert!(!mapped.is_not_found());
    }

    #[test]
    fn test_display_invalid_key() {
        let err = StorageError::invalid_key("../etc", "path traversal");
        assert_eq!(
            err.to_string(),
            "invalid storage key '../etc': path traversal"
        );
    }
}
