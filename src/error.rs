//! Error taxonomy for the inference pipeline

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Failures raised while loading artifacts or serving a prediction.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PipelineError {
    /// Missing or malformed artifacts. Fatal at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The request could not be turned into a valid feature vector.
    #[error("Error in preprocessing: {0}")]
    Preprocessing(String),

    /// A classifier failed while producing probabilities.
    #[error("scoring failed: {0}")]
    Scoring(String),
}

impl PipelineError {
    pub fn config(msg: impl Into<String>) -> Self {
        PipelineError::Configuration(msg.into())
    }

    pub fn preprocessing(msg: impl Into<String>) -> Self {
        PipelineError::Preprocessing(msg.into())
    }

    pub fn scoring(msg: impl Into<String>) -> Self {
        PipelineError::Scoring(msg.into())
    }

    /// HTTP-style status the transport reports for this failure.
    pub fn status_code(&self) -> u16 {
        match self {
            PipelineError::Preprocessing(_) => 400,
            PipelineError::Configuration(_) | PipelineError::Scoring(_) => 500,
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }

    /// Caller-facing body. Carries the cause, never internals beyond it.
    pub fn to_response(&self) -> ErrorResponse {
        let error = if self.is_client_error() {
            format!("Invalid input data: {}", self)
        } else {
            format!("Prediction failed: {}", self)
        };
        ErrorResponse {
            error,
            status: self.status_code(),
        }
    }
}

/// Error reply published back to the requester
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
    pub status: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(PipelineError::preprocessing("bad").status_code(), 400);
        assert_eq!(PipelineError::scoring("boom").status_code(), 500);
        assert_eq!(PipelineError::config("missing").status_code(), 500);
    }

    #[test]
    fn test_error_response_body() {
        let body = PipelineError::preprocessing("column mismatch").to_response();
        assert_eq!(body.status, 400);
        assert_eq!(
            body.error,
            "Invalid input data: Error in preprocessing: column mismatch"
        );

        let body = PipelineError::scoring("xgboost: empty output").to_response();
        assert_eq!(body.status, 500);
        assert!(body.error.starts_with("Prediction failed: "));
    }
}
