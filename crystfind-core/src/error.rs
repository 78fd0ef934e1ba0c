//! Error types for crystfind-core.

use thiserror::Error;

/// Result type alias for crystfind operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for crystfind operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Two arrays that must share a shape do not.
    #[error("shape mismatch for {what}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// The detector geometry collaborator failed.
    #[error("geometry error: {0}")]
    Geometry(String),

    /// The frame source could not provide a frame.
    #[error("frame source error: {0}")]
    FrameSource(String),
}

impl Error {
    /// Builds a [`Error::ShapeMismatch`] from two array shapes.
    pub fn shape_mismatch(what: &'static str, expected: &[usize], actual: &[usize]) -> Self {
        Self::ShapeMismatch {
            what,
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }
}

/// Ensures `actual` equals `expected`, naming the offending array otherwise.
///
/// # Errors
/// Returns [`Error::ShapeMismatch`] when the shapes differ.
pub fn ensure_shape(what: &'static str, expected: &[usize], actual: &[usize]) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::shape_mismatch(what, expected, actual))
    }
}
