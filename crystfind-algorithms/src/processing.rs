//! High-level processing helpers that combine streak masking and peak
//! finding, single-frame and batched.
//!
//! Batches run one frame per rayon task. Frames never share scratch
//! buffers; the streak context is shared read-only. Results keep input order.

use crate::peak_finder::find_peaks;
use crate::streak::StreakMaskContext;
use crystfind_core::error::{Error, Result};
use crystfind_core::geometry::DetectorGeometry;
use crystfind_core::mask::combine_masks;
use crystfind_core::peak::{Peak, PeakFinderConfig};
use ndarray::{Array2, Array3, ArrayView2, ArrayView3};
use rayon::prelude::*;

/// Streak-masks a raw frame, combines the result with `static_mask` and
/// runs the peak finder on the panels stacked vertically.
///
/// An unusable streak context contributes no mask.
///
/// # Errors
/// Returns configuration, shape or geometry errors.
pub fn find_peaks_with_streak_mask<G: DetectorGeometry>(
    frame: ArrayView3<'_, f64>,
    context: &StreakMaskContext<G>,
    static_mask: Option<ArrayView3<'_, bool>>,
    config: &PeakFinderConfig,
) -> Result<Vec<Peak>> {
    config.validate()?;
    let streak = context.streak_mask(frame)?;
    let streak_view = streak.as_ref().map(|m| m.view());
    let mask = combine_masks(
        frame.raw_dim(),
        [streak_view, static_mask.map(|m| m.reborrow())],
    )?;

    let (panels, rows, cols) = frame.dim();
    let flat_dim = (panels * rows, cols);
    let flat_frame = frame
        .to_shape(flat_dim)
        .map_err(|e| Error::Geometry(format!("cannot stack panels: {e}")))?;
    let flat_mask = mask
        .to_shape(flat_dim)
        .map_err(|e| Error::Geometry(format!("cannot stack mask panels: {e}")))?;

    find_peaks(flat_frame.view(), config, Some(flat_mask.view()))
}

/// Runs [`find_peaks`] over many frames in parallel.
///
/// # Errors
/// Returns the first error encountered.
pub fn find_peaks_batch(
    frames: &[Array2<f64>],
    config: &PeakFinderConfig,
    mask: Option<ArrayView2<'_, bool>>,
) -> Result<Vec<Vec<Peak>>> {
    config.validate()?;
    frames
        .par_iter()
        .map(|frame| find_peaks(frame.view(), config, mask))
        .collect()
}

/// Computes streak masks for many raw frames in parallel.
///
/// # Errors
/// Returns the first error encountered.
pub fn streak_mask_batch<G: DetectorGeometry + Sync>(
    context: &StreakMaskContext<G>,
    frames: &[Array3<f64>],
) -> Result<Vec<Option<Array3<bool>>>> {
    frames
        .par_iter()
        .map(|frame| context.streak_mask(frame.view()))
        .collect()
}

/// Runs [`find_peaks_with_streak_mask`] over many raw frames in parallel.
///
/// # Errors
/// Returns the first error encountered.
pub fn find_peaks_with_streak_mask_batch<G: DetectorGeometry + Sync>(
    frames: &[Array3<f64>],
    context: &StreakMaskContext<G>,
    static_mask: Option<ArrayView3<'_, bool>>,
    config: &PeakFinderConfig,
) -> Result<Vec<Vec<Peak>>> {
    config.validate()?;
    frames
        .par_iter()
        .map(|frame| find_peaks_with_streak_mask(frame.view(), context, static_mask, config))
        .collect()
}
