//! Detector geometry and frame-source traits.
//!
//! The geometry collaborator maps panel-tiled raw arrays into a single
//! assembled detector-plane image. Facility geometries live outside this
//! workspace and plug in through [`DetectorGeometry`]; `crystfind-geometry`
//! ships a configuration-driven implementation.
#![allow(clippy::cast_precision_loss)]

use crate::error::{ensure_shape, Result};
use ndarray::{Array2, Array3, ArrayView3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Shape of a panel-tiled raw frame: `(panels, rows, cols)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RawShape {
    /// Number of detector panels.
    pub panels: usize,
    /// Rows per panel.
    pub rows: usize,
    /// Columns per panel.
    pub cols: usize,
}

impl RawShape {
    /// Creates a new raw shape.
    #[inline]
    #[must_use]
    pub fn new(panels: usize, rows: usize, cols: usize) -> Self {
        Self { panels, rows, cols }
    }

    /// Total number of raw pixels.
    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.panels * self.rows * self.cols
    }

    /// Shape as an ndarray dimension tuple.
    #[inline]
    #[must_use]
    pub fn dim(&self) -> (usize, usize, usize) {
        (self.panels, self.rows, self.cols)
    }

    /// Shape of the 2D view obtained by stacking panels vertically.
    #[inline]
    #[must_use]
    pub fn flat_dim(&self) -> (usize, usize) {
        (self.panels * self.rows, self.cols)
    }
}

impl From<(usize, usize, usize)> for RawShape {
    fn from((panels, rows, cols): (usize, usize, usize)) -> Self {
        Self::new(panels, rows, cols)
    }
}

/// Detector geometry collaborator.
///
/// Implementations must be deterministic: projecting the same raw array
/// twice yields the same assembled image.
pub trait DetectorGeometry {
    /// Shape of the raw (unassembled) arrays this geometry accepts.
    fn raw_shape(&self) -> RawShape;

    /// Shape of the assembled image.
    fn assembled_shape(&self) -> (usize, usize);

    /// Projects a per-raw-pixel array into assembled image space.
    ///
    /// Assembled pixels not covered by any raw pixel must be `0.0`.
    ///
    /// # Errors
    /// Returns an error when the array does not match [`Self::raw_shape`]
    /// or the projection itself fails.
    fn project(&self, raw: ArrayView3<'_, f64>) -> Result<Array2<f64>>;

    /// Assembled-space reference point `(row, col)`, typically the beam
    /// center. `None` when the geometry has no physical center.
    fn center(&self) -> Option<(usize, usize)>;
}

impl<G: DetectorGeometry + ?Sized> DetectorGeometry for &G {
    fn raw_shape(&self) -> RawShape {
        (**self).raw_shape()
    }

    fn assembled_shape(&self) -> (usize, usize) {
        (**self).assembled_shape()
    }

    fn project(&self, raw: ArrayView3<'_, f64>) -> Result<Array2<f64>> {
        (**self).project(raw)
    }

    fn center(&self) -> Option<(usize, usize)> {
        (**self).center()
    }
}

impl<G: DetectorGeometry + ?Sized> DetectorGeometry for Box<G> {
    fn raw_shape(&self) -> RawShape {
        (**self).raw_shape()
    }

    fn assembled_shape(&self) -> (usize, usize) {
        (**self).assembled_shape()
    }

    fn project(&self, raw: ArrayView3<'_, f64>) -> Result<Array2<f64>> {
        (**self).project(raw)
    }

    fn center(&self) -> Option<(usize, usize)> {
        (**self).center()
    }
}

/// Source of calibrated raw frames for the current event.
pub trait FrameSource {
    /// Returns the calibrated per-pixel intensities.
    ///
    /// # Errors
    /// Returns [`crate::Error::FrameSource`] when no frame is available.
    fn raw_frame(&self) -> Result<Array3<f64>>;
}

/// Per-pixel indicator of panel borders: `1.0` on the first/last row and
/// first/last column of every panel, `0.0` elsewhere.
#[must_use]
pub fn edge_indicator(shape: RawShape) -> Array3<f64> {
    let mut edges = Array3::zeros(shape.dim());
    if shape.rows == 0 || shape.cols == 0 {
        return edges;
    }
    for mut panel in edges.outer_iter_mut() {
        panel.row_mut(0).fill(1.0);
        panel.row_mut(shape.rows - 1).fill(1.0);
        panel.column_mut(0).fill(1.0);
        panel.column_mut(shape.cols - 1).fill(1.0);
    }
    edges
}

/// 1-based enumeration of every raw pixel in row-major order.
///
/// Projected through a geometry this becomes the raw-pixel index table:
/// a non-zero assembled value `v` means raw flat index `v - 1` lands there.
#[must_use]
pub fn pixel_enumeration(shape: RawShape) -> Array3<f64> {
    let mut index = 0.0;
    Array3::from_shape_simple_fn(shape.dim(), || {
        index += 1.0;
        index
    })
}

/// Checks that a raw array matches the geometry's raw shape.
///
/// # Errors
/// Returns [`crate::Error::ShapeMismatch`] on mismatch.
pub fn ensure_raw_shape<G: DetectorGeometry + ?Sized>(
    geometry: &G,
    raw: &ArrayView3<'_, f64>,
) -> Result<()> {
    let expected = geometry.raw_shape();
    ensure_shape(
        "raw frame",
        &[expected.panels, expected.rows, expected.cols],
        raw.shape(),
    )
}
