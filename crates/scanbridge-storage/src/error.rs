use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the durable delivery queue.
///
/// None of these are fatal to a running sender: callers log them and retry
/// the operation on their next tick.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading, writing or renaming the queue document failed
    #[error("Queue I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The queue document or an entry payload is not valid JSON
    #[error("Queue serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The document parsed but breaks a queue invariant
    #[error("Corrupted queue document {}: {message}", path.display())]
    Corrupted { path: PathBuf, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A blocking persistence task did not complete
    #[error("Persistence task failed: {0}")]
    Task(String),
}

impl StorageError {
    pub fn corrupted(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Corrupted {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Specialized result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
