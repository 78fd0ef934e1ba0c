//! Plain-text frame and mask readers.
//!
//! Text arrays hold one row per line with whitespace- or comma-separated
//! numbers. Blank lines and lines starting with `#` are skipped. Panel-tiled
//! arrays are stored with their panels stacked vertically.

use crate::{Error, Result};
use crystfind_core::geometry::{FrameSource, RawShape};
use ndarray::{Array2, Array3};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Reads a 2D frame from a text file.
///
/// # Errors
/// Returns an error if the file cannot be read, a value does not parse or
/// rows differ in length.
pub fn read_frame_text<P: AsRef<Path>>(path: P) -> Result<Array2<f64>> {
    let file = File::open(path)?;
    parse_frame_text(BufReader::new(file))
}

/// Parses a 2D frame from text.
///
/// # Errors
/// See [`read_frame_text`].
pub fn parse_frame_text<R: BufRead>(reader: R) -> Result<Array2<f64>> {
    let mut values = Vec::new();
    let mut cols = None;
    let mut rows = 0;

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let before = values.len();
        for token in line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
        {
            let value: f64 = token.parse().map_err(|_| {
                Error::InvalidFormat(format!("line {}: cannot parse {token:?}", line_no + 1))
            })?;
            values.push(value);
        }
        let width = values.len() - before;
        match cols {
            None => cols = Some(width),
            Some(expected) if expected != width => {
                return Err(Error::InvalidFormat(format!(
                    "line {}: expected {expected} values, found {width}",
                    line_no + 1
                )));
            }
            Some(_) => {}
        }
        rows += 1;
    }

    let cols = cols.unwrap_or(0);
    Array2::from_shape_vec((rows, cols), values)
        .map_err(|e| Error::InvalidFormat(format!("frame shape: {e}")))
}

/// Reads a mask from a text file; non-zero values are usable pixels.
///
/// # Errors
/// See [`read_frame_text`].
pub fn read_mask_text<P: AsRef<Path>>(path: P) -> Result<Array2<bool>> {
    Ok(read_frame_text(path)?.mapv(|v| v != 0.0))
}

/// Splits a vertically stacked 2D array back into panels.
///
/// # Errors
/// Returns [`Error::CoreError`] with a shape mismatch if `flat` is not
/// `(panels * rows, cols)`.
pub fn unstack_panels<T>(flat: Array2<T>, shape: RawShape) -> Result<Array3<T>> {
    let (rows, cols) = shape.flat_dim();
    crystfind_core::ensure_shape("stacked panels", &[rows, cols], flat.shape())?;
    let data: Vec<T> = flat.into_iter().collect();
    Array3::from_shape_vec(shape.dim(), data)
        .map_err(|e| Error::InvalidFormat(format!("panel shape: {e}")))
}

/// Frame source backed by a text file of vertically stacked panels.
///
/// The file is read on every request.
#[derive(Debug, Clone)]
pub struct TextFrameSource {
    path: PathBuf,
    shape: RawShape,
}

impl TextFrameSource {
    /// Creates a source for `path` holding frames of `shape`.
    pub fn new<P: Into<PathBuf>>(path: P, shape: RawShape) -> Self {
        Self {
            path: path.into(),
            shape,
        }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads and reshapes the frame.
    ///
    /// # Errors
    /// Returns read, parse or shape errors.
    pub fn read(&self) -> Result<Array3<f64>> {
        unstack_panels(read_frame_text(&self.path)?, self.shape)
    }
}

impl FrameSource for TextFrameSource {
    fn raw_frame(&self) -> crystfind_core::Result<Array3<f64>> {
        self.read().map_err(|e| {
            crystfind_core::Error::FrameSource(format!("{}: {e}", self.path.display()))
        })
    }
}
