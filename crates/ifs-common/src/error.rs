//! Error types shared by the cubing crates.

use thiserror::Error;

/// Result type alias using IfsError.
pub type IfsResult<T> = Result<T, IfsError>;

/// Errors raised while constructing or validating IFS data containers.
#[derive(Debug, Error)]
pub enum IfsError {
    #[error("Shape mismatch for '{what}': expected {expected}, got {actual}")]
    ShapeMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid exposure '{name}': {message}")]
    InvalidExposure { name: String, message: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl IfsError {
    /// Create a ShapeMismatch error.
    pub fn shape_mismatch(what: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::ShapeMismatch {
            what: what.into(),
            expected,
            actual,
        }
    }

    /// Create an InvalidExposure error.
    pub fn invalid_exposure(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidExposure {
            name: name.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for IfsError {
    fn from(err: serde_json::Error) -> Self {
        IfsError::InvalidInput(format!("JSON error: {}", err))
    }
}
