//! Error types for coordinate transforms.

use thiserror::Error;

/// Errors raised while building a world-coordinate transform.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// Parameters that cannot describe a valid transform.
    #[error("invalid projection parameters: {0}")]
    InvalidParameters(String),

    /// A header that is missing a keyword or uses an unsupported axis type.
    #[error("unsupported WCS header: {0}")]
    UnsupportedHeader(String),
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;
