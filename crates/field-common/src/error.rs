//! Error types for the field crop-type tools.

use thiserror::Error;

/// Result type alias using FieldError.
pub type FieldResult<T> = Result<T, FieldError>;

/// Primary error type shared by the storage and selection layers.
#[derive(Debug, Error)]
pub enum FieldError {
    // === Input Errors ===
    #[error("Invalid state selection: {0}")]
    InvalidStates(String),

    #[error("Invalid year selection: {0}")]
    InvalidYears(String),

    // === Credential Errors ===
    #[error("Credential error: {0}")]
    Credentials(String),

    // === Storage Errors ===
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Dataset error: {0}")]
    DatasetError(String),

    // === Infrastructure Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl FieldError {
    /// True when the error means an expected artifact is absent.
    ///
    /// Callers log and skip these instead of aborting the run.
    pub fn is_not_found(&self) -> bool {
        matches!(self, FieldError::NotFound(_))
    }
}

impl From<serde_json::Error> for FieldError {
    fn from(err: serde_json::Error) -> Self {
        FieldError::InternalError(format!("JSON error: {}", err))
    }
}
