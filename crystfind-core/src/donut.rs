//! Donut (annulus) masks used as signal/background kernels.
#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]

use crate::error::{Error, Result};
use ndarray::Array2;

/// A ring-shaped boolean mask with the pixel offsets from its center.
///
/// Offsets are only filled inside the ring; pixels outside carry `0.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct DonutMask {
    /// `true` where `inner² <= dist² < outer²`.
    pub ring: Array2<bool>,
    /// Row distance from the center, for ring pixels.
    pub row_offset: Array2<f64>,
    /// Column distance from the center, for ring pixels.
    pub col_offset: Array2<f64>,
}

impl DonutMask {
    /// Number of pixels in the ring.
    #[must_use]
    pub fn count(&self) -> usize {
        self.ring.iter().filter(|&&v| v).count()
    }
}

/// Builds a donut mask over an `height x width` window.
///
/// A pixel belongs to the ring when `inner_radius² <= dist² < outer_radius²`.
/// `center` is `(row, col)` and defaults to the geometric center of the
/// window, `(height/2 - 0.5, width/2 - 0.5)`.
///
/// No validation happens here: `outer_radius <= inner_radius` simply yields
/// an empty ring. Use [`DonutKernel::new`] for a checked kernel.
#[must_use]
pub fn donut_mask(
    height: usize,
    width: usize,
    outer_radius: f64,
    inner_radius: f64,
    center: Option<(f64, f64)>,
) -> DonutMask {
    let (center_row, center_col) =
        center.unwrap_or((height as f64 / 2.0 - 0.5, width as f64 / 2.0 - 0.5));
    let outer_sq = outer_radius * outer_radius;
    let inner_sq = inner_radius * inner_radius;

    let mut ring = Array2::from_elem((height, width), false);
    let mut row_offset = Array2::zeros((height, width));
    let mut col_offset = Array2::zeros((height, width));

    for i in 0..height {
        let dr = i as f64 - center_row;
        for j in 0..width {
            let dc = j as f64 - center_col;
            let dist_sq = dr * dr + dc * dc;
            if dist_sq < outer_sq && dist_sq >= inner_sq {
                ring[[i, j]] = true;
                row_offset[[i, j]] = dr;
                col_offset[[i, j]] = dc;
            }
        }
    }

    DonutMask {
        ring,
        row_offset,
        col_offset,
    }
}

/// Square signal/background kernel used for per-peak ring statistics.
///
/// The window side is `trunc(2 * outer_radius + 1)`. `inner` is the disc
/// `dist < inner_radius`, `outer` the annulus `inner_radius <= dist < outer_radius`.
#[derive(Debug, Clone, PartialEq)]
pub struct DonutKernel {
    inner_radius: f64,
    outer_radius: f64,
    inner: Array2<bool>,
    outer: Array2<bool>,
}

impl DonutKernel {
    /// Builds a kernel, rejecting malformed radii.
    ///
    /// # Errors
    /// Returns [`Error::ConfigError`] unless `outer_radius > inner_radius > 0`
    /// and both radii are finite. A zero inner radius leaves no pixel for
    /// the local maximum, so every candidate would degrade.
    pub fn new(inner_radius: f64, outer_radius: f64) -> Result<Self> {
        if !inner_radius.is_finite() || !outer_radius.is_finite() {
            return Err(Error::ConfigError(format!(
                "donut radii must be finite (inner={inner_radius}, outer={outer_radius})"
            )));
        }
        if inner_radius <= 0.0 {
            return Err(Error::ConfigError(format!(
                "inner radius must be positive, got {inner_radius}"
            )));
        }
        if outer_radius <= inner_radius {
            return Err(Error::ConfigError(format!(
                "outer radius ({outer_radius}) must exceed inner radius ({inner_radius})"
            )));
        }

        let side = window_side(outer_radius);
        let outer = donut_mask(side, side, outer_radius, inner_radius, None).ring;
        let inner = donut_mask(side, side, inner_radius, 0.0, None).ring;

        Ok(Self {
            inner_radius,
            outer_radius,
            inner,
            outer,
        })
    }

    /// Side length of the square window.
    #[must_use]
    pub fn side(&self) -> usize {
        self.inner.nrows()
    }

    /// Pixels taken before and after the anchor pixel along each axis.
    ///
    /// For an odd side `s` this is `(s/2, s/2 + 1)`, for an even side `(s/2, s/2)`.
    #[must_use]
    pub fn half_extents(&self) -> (usize, usize) {
        let side = self.side();
        let before = side / 2;
        (before, side - before)
    }

    /// Inner disc mask.
    #[must_use]
    pub fn inner(&self) -> &Array2<bool> {
        &self.inner
    }

    /// Outer ring mask.
    #[must_use]
    pub fn outer(&self) -> &Array2<bool> {
        &self.outer
    }

    /// Number of pixels in the inner disc.
    #[must_use]
    pub fn inner_count(&self) -> usize {
        self.inner.iter().filter(|&&v| v).count()
    }

    /// Inner radius.
    #[must_use]
    pub fn inner_radius(&self) -> f64 {
        self.inner_radius
    }

    /// Outer radius.
    #[must_use]
    pub fn outer_radius(&self) -> f64 {
        self.outer_radius
    }
}

fn window_side(outer_radius: f64) -> usize {
    (outer_radius * 2.0 + 1.0).trunc().max(0.0) as usize
}
