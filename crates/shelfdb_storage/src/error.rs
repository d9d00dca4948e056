//! Error types for storage operations.

use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The advisory lock could not be acquired before the deadline.
    #[error("timed out after {timeout:?} waiting for lock {}", path.display())]
    LockTimeout {
        /// The lock file that was contended.
        path: PathBuf,
        /// How long the caller waited.
        timeout: Duration,
    },
}
