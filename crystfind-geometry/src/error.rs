//! Geometry error types.

use thiserror::Error;

/// Result type for geometry operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Geometry error types.
#[derive(Error, Debug)]
pub enum Error {
    /// A panel transform maps pixels outside the assembled image.
    #[error("panel {panel} transform invalid: {message}")]
    InvalidTransform {
        /// Panel index.
        panel: usize,
        /// What went wrong.
        message: String,
    },

    /// Layout-level inconsistency.
    #[error("invalid layout: {0}")]
    InvalidLayout(String),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Core library error.
    #[error("core error: {0}")]
    CoreError(#[from] crystfind_core::Error),
}

impl From<Error> for crystfind_core::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::CoreError(inner) => inner,
            other => crystfind_core::Error::Geometry(other.to_string()),
        }
    }
}
