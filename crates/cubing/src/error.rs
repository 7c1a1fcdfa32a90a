//! Error types for cube building.

use ifs_common::IfsError;
use projection::ProjectionError;
use thiserror::Error;

/// Errors that can occur while building, transforming or storing a cube.
#[derive(Error, Debug)]
pub enum CubingError {
    /// Invalid or missing configuration, detected before any work starts.
    #[error("configuration error: {0}")]
    Config(String),

    /// Input data that cannot be processed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Array length does not match the expected shape.
    #[error("shape mismatch for {what}: expected {expected} elements, got {actual}")]
    ShapeMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },

    /// Zarr format error.
    #[error("Zarr format error: {0}")]
    Zarr(String),

    /// Storage/IO error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Invalid metadata in a stored cube.
    #[error("invalid cube metadata: {0}")]
    InvalidMetadata(String),

    /// Error from the shared domain types.
    #[error(transparent)]
    Ifs(#[from] IfsError),

    /// Error while building a world-coordinate transform.
    #[error(transparent)]
    Projection(#[from] ProjectionError),
}

impl CubingError {
    /// Create a Config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an InvalidInput error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a ShapeMismatch error.
    pub fn shape_mismatch(what: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::ShapeMismatch {
            what: what.into(),
            expected,
            actual,
        }
    }

    /// Create a Zarr error.
    pub fn zarr(msg: impl std::fmt::Display) -> Self {
        Self::Zarr(msg.to_string())
    }

    /// Create a Storage error.
    pub fn storage(msg: impl std::fmt::Display) -> Self {
        Self::Storage(msg.to_string())
    }

    /// Create an InvalidMetadata error.
    pub fn invalid_metadata(msg: impl Into<String>) -> Self {
        Self::InvalidMetadata(msg.into())
    }
}

impl From<std::io::Error> for CubingError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for CubingError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidMetadata(err.to_string())
    }
}

/// Result type for cubing operations.
pub type Result<T> = std::result::Result<T, CubingError>;
