//! Error types for gemlens-ai
//!
//! Classification and extraction errors are per-image: the pipeline records
//! them against the image and keeps going. Fusion has no error path.

use std::time::Duration;
use thiserror::Error;

/// Analysis error type
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Oracle response failed schema validation
    #[error("Malformed oracle output: {0}")]
    MalformedOutput(String),

    /// Image reference carries neither a URL nor inline data
    #[error("Missing image source for '{0}'")]
    MissingSource(String),

    /// Oracle call exceeded its time bound
    #[error("Oracle call timed out after {0:?}")]
    Timeout(Duration),

    /// A claim or extraction violates the closed vocabularies
    #[error("Validation error: {0}")]
    Validation(String),

    /// Oracle transport failure (network, HTTP status)
    #[error("Oracle request failed: {0}")]
    Oracle(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// gemlens-common error
    #[error("Common error: {0}")]
    Common(#[from] gemlens_common::Error),
}

impl AnalysisError {
    /// Stable snake_case label for reports and events
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::MalformedOutput(_) => "malformed_output",
            AnalysisError::MissingSource(_) => "missing_source",
            AnalysisError::Timeout(_) => "timeout",
            AnalysisError::Validation(_) => "validation_error",
            AnalysisError::Oracle(_) => "oracle_error",
            AnalysisError::Io(_) => "io_error",
            AnalysisError::Common(_) => "common_error",
        }
    }
}

/// Result type for analysis operations
pub type AnalysisResult<T> = Result<T, AnalysisError>;
