//! Grayscale morphology: reconstruction by dilation, h-maxima and the
//! 2x2 box sum used by the streak detector.

use crate::label::{neighbor, Connectivity};
use crystfind_core::error::{ensure_shape, Result};
use ndarray::{Array2, ArrayView2, Zip};
use std::collections::VecDeque;

/// Relative tolerance subtracted from the h-maxima shift so plateau tops
/// survive rounding.
const RESOLUTION: f64 = 1e-15;

/// Grayscale reconstruction by dilation of `marker` under `mask`.
///
/// The marker is first clipped to the mask. Runs the hybrid algorithm
/// (forward raster scan, backward raster scan, then FIFO propagation).
///
/// # Errors
/// Returns [`crystfind_core::Error::ShapeMismatch`] if the shapes differ.
pub fn reconstruct_by_dilation(
    marker: ArrayView2<'_, f64>,
    mask: ArrayView2<'_, f64>,
    connectivity: Connectivity,
) -> Result<Array2<f64>> {
    ensure_shape("reconstruction mask", marker.shape(), mask.shape())?;
    Ok(reconstruct(marker, mask, connectivity))
}

fn reconstruct(
    marker: ArrayView2<'_, f64>,
    mask: ArrayView2<'_, f64>,
    connectivity: Connectivity,
) -> Array2<f64> {
    let dim = mask.dim();
    let (rows, cols) = dim;
    let mut rec = Zip::from(&marker)
        .and(&mask)
        .map_collect(|&m, &limit| m.min(limit));
    let forward = connectivity.forward_offsets();

    for row in 0..rows {
        for col in 0..cols {
            let mut value = rec[[row, col]];
            for &offset in forward {
                if let Some(pos) = neighbor((row, col), offset, dim) {
                    value = value.max(rec[pos]);
                }
            }
            rec[[row, col]] = value.min(mask[[row, col]]);
        }
    }

    let mut queue = VecDeque::new();
    for row in (0..rows).rev() {
        for col in (0..cols).rev() {
            let mut value = rec[[row, col]];
            for &(dr, dc) in forward {
                if let Some(pos) = neighbor((row, col), (-dr, -dc), dim) {
                    value = value.max(rec[pos]);
                }
            }
            let value = value.min(mask[[row, col]]);
            rec[[row, col]] = value;

            let can_grow = forward.iter().any(|&(dr, dc)| {
                neighbor((row, col), (-dr, -dc), dim)
                    .is_some_and(|pos| rec[pos] < value && rec[pos] < mask[pos])
            });
            if can_grow {
                queue.push_back((row, col));
            }
        }
    }

    while let Some(pos) = queue.pop_front() {
        let value = rec[pos];
        for &offset in connectivity.offsets() {
            let Some(next) = neighbor(pos, offset, dim) else {
                continue;
            };
            if rec[next] < value && rec[next] < mask[next] {
                rec[next] = value.min(mask[next]);
                queue.push_back(next);
            }
        }
    }

    rec
}

/// Regional maxima of height at least `h` (8-connected).
///
/// A pixel is marked when `image - reconstruction >= h`, where the
/// reconstruction is of `image - h` under `image`. If `h` exceeds the
/// peak-to-peak range of the image nothing is marked.
#[must_use]
pub fn h_maxima(image: ArrayView2<'_, f64>, h: f64) -> Array2<bool> {
    let (min, max) = image
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if image.is_empty() || h > max - min {
        return Array2::from_elem(image.raw_dim(), false);
    }

    let shifted = image.mapv(|v| v - h - 2.0 * RESOLUTION * v.abs());
    let rec = reconstruct(shifted.view(), image, Connectivity::Eight);
    Zip::from(&image)
        .and(&rec)
        .map_collect(|&v, &r| v - r >= h)
}

/// 2x2 box sum aligned to the lower-right pixel:
/// `b[i,j] = c[i,j] + c[i-1,j] + c[i,j-1] + c[i-1,j-1]`, missing terms 0.
#[must_use]
pub fn box_sum_2x2(image: ArrayView2<'_, f64>) -> Array2<f64> {
    let mut out = image.to_owned();
    let (rows, cols) = image.dim();
    for row in 0..rows {
        for col in 0..cols {
            let mut sum = out[[row, col]];
            if row > 0 {
                sum += image[[row - 1, col]];
            }
            if col > 0 {
                sum += image[[row, col - 1]];
            }
            if row > 0 && col > 0 {
                sum += image[[row - 1, col - 1]];
            }
            out[[row, col]] = sum;
        }
    }
    out
}
