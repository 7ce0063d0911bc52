use thiserror::Error;

/// Storage-related errors shared by settings and the media store.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to access file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse data: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Failed to create directory: {0}")]
    Directory(String),

    #[error("Data not found: {0}")]
    NotFound(String),
}

impl StorageError {
    pub fn directory(msg: impl Into<String>) -> Self {
        StorageError::Directory(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        StorageError::NotFound(msg.into())
    }
}
