//! Bragg peak finder.
//!
//! Candidates are the 8-connected h-maxima of the frame. Each candidate is
//! measured with a donut kernel: the inner disc gives the signal, the outer
//! ring the local background.
//!
//! Windows that cross the frame boundary are clipped; only kernel pixels
//! inside the frame contribute.
#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]

use crate::label::{label, Connectivity};
use crate::morphology::h_maxima;
use crystfind_core::donut::DonutKernel;
use crystfind_core::error::{ensure_shape, Result};
use crystfind_core::peak::{
    CandidateOutcome, DegradeReason, Peak, PeakFinderConfig, RingStatistics,
};
use ndarray::{ArrayView2, Zip};

/// Finds peaks in `frame` and keeps those passing every threshold.
///
/// `mask` marks usable pixels; maxima on excluded pixels are dropped
/// before labeling. Peaks are returned in label (raster) order.
///
/// # Errors
/// Returns a configuration error or a shape mismatch between frame and mask.
pub fn find_peaks(
    frame: ArrayView2<'_, f64>,
    config: &PeakFinderConfig,
    mask: Option<ArrayView2<'_, bool>>,
) -> Result<Vec<Peak>> {
    let outcomes = evaluate_candidates(frame, config, mask)?;
    let total = outcomes.len();
    let peaks: Vec<Peak> = outcomes
        .iter()
        .map(CandidateOutcome::peak)
        .filter(|peak| config.accepts(peak))
        .copied()
        .collect();
    log::debug!("kept {} of {total} candidates", peaks.len());
    Ok(peaks)
}

/// Measures every candidate without applying the thresholds.
///
/// # Errors
/// See [`find_peaks`].
pub fn evaluate_candidates(
    frame: ArrayView2<'_, f64>,
    config: &PeakFinderConfig,
    mask: Option<ArrayView2<'_, bool>>,
) -> Result<Vec<CandidateOutcome>> {
    let kernel = config.kernel()?;
    let positions = candidates(frame, config.hvalue, mask)?;

    let outcomes: Vec<CandidateOutcome> = positions
        .into_iter()
        .map(|(row, col)| measure_candidate(frame, &kernel, row, col, config.hvalue))
        .collect();

    let degraded = outcomes.iter().filter(|o| o.is_degraded()).count();
    if degraded > 0 {
        log::debug!("{degraded} of {} candidates degraded", outcomes.len());
    }
    Ok(outcomes)
}

/// Candidate centroids `(row, col)`: one per 8-connected component of
/// h-maxima, after masking.
///
/// # Errors
/// Returns [`crystfind_core::Error::ShapeMismatch`] if the mask shape
/// differs from the frame.
pub fn candidates(
    frame: ArrayView2<'_, f64>,
    hvalue: f64,
    mask: Option<ArrayView2<'_, bool>>,
) -> Result<Vec<(f64, f64)>> {
    let mut maxima = h_maxima(frame, hvalue);
    if let Some(mask) = mask {
        ensure_shape("peak mask", frame.shape(), mask.shape())?;
        Zip::from(&mut maxima)
            .and(&mask)
            .for_each(|m, &usable| *m &= usable);
    }
    Ok(label(maxima.view(), Connectivity::Eight).centroids())
}

/// Ring statistics for one candidate.
///
/// The window anchor is `floor(row), floor(col)`; the window spans
/// `[anchor - before, anchor + after)` with `(before, after)` from
/// [`DonutKernel::half_extents`].
#[must_use]
pub fn measure_candidate(
    frame: ArrayView2<'_, f64>,
    kernel: &DonutKernel,
    row: f64,
    col: f64,
    hvalue: f64,
) -> CandidateOutcome {
    let degraded = |reason| CandidateOutcome::Degraded {
        peak: Peak {
            row,
            col,
            pixel_count: 0,
            integrated_intensity: 0.0,
            signal_to_noise: 0.0,
        },
        reason,
    };

    let (rows, cols) = frame.dim();
    let (before, _) = kernel.half_extents();
    let row0 = row.floor() as i64 - before as i64;
    let col0 = col.floor() as i64 - before as i64;
    let side = kernel.side() as i64;
    if row0 >= rows as i64 || col0 >= cols as i64 || row0 + side <= 0 || col0 + side <= 0 {
        return degraded(DegradeReason::WindowOutsideFrame);
    }

    let mut inner_sum = 0.0;
    let mut inner_count = 0_usize;
    let mut pixel_count = 0_usize;
    let mut background = Vec::with_capacity(kernel.side() * kernel.side());

    Zip::indexed(kernel.inner())
        .and(kernel.outer())
        .for_each(|(ki, kj), &inner, &outer| {
            if !inner && !outer {
                return;
            }
            let r = row0 + ki as i64;
            let c = col0 + kj as i64;
            if r < 0 || c < 0 || r >= rows as i64 || c >= cols as i64 {
                return;
            }
            let value = frame[[r as usize, c as usize]];
            if inner {
                inner_sum += value;
                inner_count += 1;
                if value >= hvalue {
                    pixel_count += 1;
                }
            } else {
                background.push(value);
            }
        });

    if inner_count == 0 {
        return degraded(DegradeReason::EmptyInnerDisc);
    }
    if background.is_empty() {
        return degraded(DegradeReason::EmptyOuterRing);
    }

    let n_bg = background.len() as f64;
    let mean_background = background.iter().sum::<f64>() / n_bg;
    let std_background = (background
        .iter()
        .map(|v| (v - mean_background).powi(2))
        .sum::<f64>()
        / n_bg)
        .sqrt();
    let mean_signal = inner_sum / inner_count as f64;
    let integrated_intensity = inner_sum - inner_count as f64 * mean_background;

    if mean_signal.is_nan() || std_background.is_nan() || integrated_intensity.is_nan() {
        log::debug!("candidate at ({row:.1}, {col:.1}) has non-finite statistics");
        return degraded(DegradeReason::NonFinite);
    }

    let signal_to_noise = if std_background == 0.0 {
        -1.0
    } else {
        mean_signal / std_background
    };

    CandidateOutcome::Measured {
        peak: Peak {
            row,
            col,
            pixel_count,
            integrated_intensity,
            signal_to_noise,
        },
        stats: RingStatistics {
            mean_signal,
            mean_background,
            std_background,
            inner_pixels: inner_count,
            outer_pixels: background.len(),
        },
    }
}
