//! Error types and result aliases shared across the workspace.

/// The result type used throughout tributary-core.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in core primitive operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An invalid identifier was provided.
    #[error("invalid identifier: {message}")]
    InvalidId {
        /// Description of what made the ID invalid.
        message: String,
    },
}
