//! File storage error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    /// Public path does not point inside the upload directory
    #[error("Invalid storage path: {0}")]
    InvalidPath(String),

    /// Filesystem operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
