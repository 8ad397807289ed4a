use std::path::PathBuf;
use thiserror::Error;

/// A convenience `Result` alias using [`TenureError`].
pub type TenureResult<T> = Result<T, TenureError>;

/// Top-level error type for the Tenure session store.
///
/// A missing or expired session is not an error: lookups report it as
/// `Ok(None)` or `Ok(false)`.
#[derive(Error, Debug)]
pub enum TenureError {
    /// Invalid construction or call parameters (non-positive TTL, unusable
    /// storage path, unreadable config file).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A file operation on the persisted mirror failed.
    #[error("Persistence error while {operation} {}: {source}", path.display())]
    Persistence {
        /// What the store was doing, e.g. "writing session file".
        operation: &'static str,
        /// The file or directory involved.
        path: PathBuf,
        /// The underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// A session could not be encoded or decoded as JSON.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TenureError {
    /// Builds a [`TenureError::Configuration`] from anything displayable.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Wraps an I/O failure on `path` as a [`TenureError::Persistence`].
    pub fn persistence(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::Persistence {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Returns `true` for configuration errors.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Returns `true` for persistence errors.
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence { .. })
    }
}
