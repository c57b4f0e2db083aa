use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by room stores and person sources regardless of the backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Backend unreachable or the operation failed.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// Context of the failure.
        message: String,
        /// Backend error.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}
