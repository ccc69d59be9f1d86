//! Error types for the crop-type crate.

use field_common::{FieldError, Year};
use thiserror::Error;

/// Errors that can occur while planning exports or merging results.
#[derive(Error, Debug)]
pub enum CropTypeError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A (state, year) known to have no valid source image. Always fatal.
    #[error("No valid source image for {state} {year}: {reason}")]
    InvalidSource {
        state: String,
        year: Year,
        reason: String,
    },

    #[error("Invalid remap table: {0}")]
    Remap(String),

    #[error("Malformed result table {path}: {message}")]
    MalformedResult { path: String, message: String },

    #[error("Failed to read CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to read file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error(transparent)]
    Field(#[from] FieldError),

    #[error(transparent)]
    Compute(#[from] compute::ComputeError),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl CropTypeError {
    /// Missing artifacts are logged and skipped by the callers.
    pub fn is_not_found(&self) -> bool {
        match self {
            CropTypeError::Field(e) => e.is_not_found(),
            CropTypeError::Compute(compute::ComputeError::Field(e)) => e.is_not_found(),
            _ => false,
        }
    }
}

/// Result type for crop-type operations.
pub type Result<T> = std::result::Result<T, CropTypeError>;
