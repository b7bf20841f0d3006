//! Error types for the trigger engine.

/// The result type used throughout tributary-flow.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in trigger-engine operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An asset URI was referenced that is not registered.
    #[error("asset not found: {uri}")]
    AssetNotFound {
        /// The URI that was looked up.
        uri: String,
    },

    /// A queued fulfillment marker was not found.
    #[error("queued marker not found for dag '{dag_id}' and asset '{asset_uri}'")]
    MarkerNotFound {
        /// The workflow the marker targets.
        dag_id: String,
        /// The asset URI the marker tracks.
        asset_uri: String,
    },

    /// An unknown ordering attribute was requested.
    #[error("ordering with '{attribute}' is disallowed or the attribute does not exist")]
    InvalidOrdering {
        /// The attribute that was rejected.
        attribute: String,
    },

    /// A request payload failed validation.
    #[error("validation failed: {message}")]
    Validation {
        /// Description of the failed validation.
        message: String,
    },

    /// Fulfillment markers were consumed by a concurrent evaluation.
    ///
    /// This is the conflict half of the "first clear wins" protocol. It is
    /// resolved inside [`RunScheduler`](crate::scheduler::RunScheduler) and
    /// never escapes `record_event`.
    #[error("fulfillment markers for dag '{dag_id}' were concurrently consumed")]
    MarkerConflict {
        /// The workflow whose markers were already gone.
        dag_id: String,
    },

    /// A storage operation failed.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A serialization error occurred.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// An error from tributary-core.
    #[error("core error: {0}")]
    Core(#[from] tributary_core::Error),
}

impl Error {
    /// Creates a new storage error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new storage error with a source.
    #[must_use]
    pub fn storage_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a new asset-not-found error.
    #[must_use]
    pub fn asset_not_found(uri: impl Into<String>) -> Self {
        Self::AssetNotFound { uri: uri.into() }
    }

    /// Returns true if this error is a concurrent-consumption conflict.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::MarkerConflict { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;

    #[test]
    fn asset_not_found_display() {
        let err = Error::asset_not_found("s3://bucket/key");
        assert!(err.to_string().contains("asset not found"));
        assert!(err.to_string().contains("s3://bucket/key"));
    }

    #[test]
    fn invalid_ordering_names_the_attribute() {
        let err = Error::InvalidOrdering {
            attribute: "fake".into(),
        };
        assert_eq!(
            err.to_string(),
            "ordering with 'fake' is disallowed or the attribute does not exist"
        );
    }

    #[test]
    fn marker_conflict_is_conflict() {
        let err = Error::MarkerConflict {
            dag_id: "consumer".into(),
        };
        assert!(err.is_conflict());
        assert!(!Error::validation("nope").is_conflict());
    }

    #[test]
    fn storage_error_with_source() {
        let source = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::storage_with_source("failed to read row", source);
        assert!(err.to_string().contains("storage error"));
        assert!(StdError::source(&err).is_some());
    }
}
