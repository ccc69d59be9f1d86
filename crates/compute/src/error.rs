//! Error types for the compute crate.

use field_common::FieldError;
use thiserror::Error;

/// Errors talking to the remote compute service.
///
/// Every variant aborts the run: a failed task listing must never be read
/// as "nothing is running".
#[derive(Error, Debug)]
pub enum ComputeError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Remote service returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Invalid response from remote service: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Field(#[from] FieldError),
}

/// Result type for compute operations.
pub type Result<T> = std::result::Result<T, ComputeError>;
