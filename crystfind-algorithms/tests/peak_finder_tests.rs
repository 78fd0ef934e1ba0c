#![allow(clippy::cast_precision_loss, clippy::float_cmp)]
use approx::assert_relative_eq;
use crystfind_algorithms::{evaluate_candidates, find_peaks, CandidateOutcome, PeakFinderConfig};
use ndarray::Array2;
use std::f64::consts::PI;

const AMPLITUDE: f64 = 2000.0;
const SIGMA: f64 = 1.5;

fn background(r: usize, c: usize) -> f64 {
    10.0 + 3.0 * ((r * 7 + c * 13) % 5) as f64
}

fn gaussian_frame(shape: (usize, usize), centers: &[(usize, usize)]) -> Array2<f64> {
    Array2::from_shape_fn(shape, |(r, c)| {
        let bumps: f64 = centers
            .iter()
            .map(|&(pr, pc)| {
                let d2 = (r as f64 - pr as f64).powi(2) + (c as f64 - pc as f64).powi(2);
                AMPLITUDE * (-d2 / (2.0 * SIGMA * SIGMA)).exp()
            })
            .sum();
        background(r, c) + bumps
    })
}

#[test]
fn test_two_isolated_peaks() {
    let frame = gaussian_frame((64, 64), &[(20, 20), (44, 40)]);
    let config = PeakFinderConfig::new().with_son_min(5.0);

    let peaks = find_peaks(frame.view(), &config, None).unwrap();
    assert_eq!(peaks.len(), 2, "found {peaks:?}");

    // Label order is raster order.
    assert_eq!((peaks[0].row, peaks[0].col), (20.0, 20.0));
    assert_eq!((peaks[1].row, peaks[1].col), (44.0, 40.0));

    let total = 2.0 * PI * SIGMA * SIGMA * AMPLITUDE;
    for peak in &peaks {
        // Every pixel of the radius-3 disc sits above the extinction height.
        assert_eq!(peak.pixel_count, 25);
        let fraction = peak.integrated_intensity / total;
        assert!(fraction > 0.7 && fraction < 0.9, "atot fraction {fraction}");
        assert!(peak.signal_to_noise > 10.0, "son {}", peak.signal_to_noise);
    }
}

#[test]
fn test_thresholds_filter_peaks() {
    let frame = gaussian_frame((64, 64), &[(20, 20), (44, 40)]);
    let base = PeakFinderConfig::new().with_son_min(5.0);

    let none = |config: PeakFinderConfig| find_peaks(frame.view(), &config, None).unwrap().is_empty();
    assert!(none(base.clone().with_atot_thr(30_000.0)));
    // npix_max is exclusive.
    assert!(none(base.clone().with_npix(2, 25)));
    assert!(none(base.clone().with_son_min(50.0)));
    assert!(!none(base.with_npix(25, 26)));
}

#[test]
fn test_deterministic() {
    let frame = gaussian_frame((48, 48), &[(12, 30), (30, 12)]);
    let config = PeakFinderConfig::permissive();
    let first = find_peaks(frame.view(), &config, None).unwrap();
    let second = find_peaks(frame.view(), &config, None).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_flat_frame() {
    let frame = Array2::from_elem((16, 16), 5.0);

    // Positive extinction height: nothing rises above the plateau.
    let config = PeakFinderConfig::permissive();
    assert!(find_peaks(frame.view(), &config, None).unwrap().is_empty());

    // Zero height: the whole frame is one maximum with a flat background.
    let config = PeakFinderConfig::permissive().with_hvalue(0.0);
    let outcomes = evaluate_candidates(frame.view(), &config, None).unwrap();
    assert_eq!(outcomes.len(), 1);
    let peak = outcomes[0].peak();
    assert_eq!((peak.row, peak.col), (7.5, 7.5));
    assert_eq!(peak.signal_to_noise, -1.0);
    assert_relative_eq!(peak.integrated_intensity, 0.0, epsilon = 1e-9);

    let peaks = find_peaks(frame.view(), &config, None).unwrap();
    assert_eq!(peaks.len(), 1);
}

#[test]
fn test_peak_near_corner_is_clipped_not_dropped() {
    let frame = gaussian_frame((32, 32), &[(1, 1)]);
    let config = PeakFinderConfig::permissive();
    let outcomes = evaluate_candidates(frame.view(), &config, None).unwrap();
    assert_eq!(outcomes.len(), 1);
    match &outcomes[0] {
        CandidateOutcome::Measured { peak, stats } => {
            assert!(stats.inner_pixels < 25);
            assert_eq!(peak.pixel_count, stats.inner_pixels);
            assert!(peak.integrated_intensity > 0.0);
        }
        other => panic!("expected measured outcome, got {other:?}"),
    }
}

#[test]
fn test_mask_excludes_peak() {
    let frame = gaussian_frame((64, 64), &[(20, 20), (44, 40)]);
    let config = PeakFinderConfig::new().with_son_min(5.0);

    let mut mask = Array2::from_elem((64, 64), true);
    mask[[20, 20]] = false;
    let peaks = find_peaks(frame.view(), &config, Some(mask.view())).unwrap();
    assert_eq!(peaks.len(), 1);
    assert_eq!((peaks[0].row, peaks[0].col), (44.0, 40.0));
}
