//! crystfind-algorithms: Image analysis for X-ray area-detector frames.
//!
//! This crate provides:
//! - **Morphology** - grayscale reconstruction, h-maxima, 2x2 box sum
//! - **Labeling** - 4/8-connected components with union-find
//! - **Peak finder** - h-maxima candidates measured with donut kernels
//! - **Streak mask** - edge-connected hot regions around the beam center
//!
#![warn(missing_docs)]

pub mod label;
pub mod morphology;
mod peak_finder;
mod processing;
mod streak;

pub use label::{label, Connectivity, Labels};
pub use morphology::{box_sum_2x2, h_maxima, reconstruct_by_dilation};
pub use peak_finder::{candidates, evaluate_candidates, find_peaks, measure_candidate};
pub use processing::{
    find_peaks_batch, find_peaks_with_streak_mask, find_peaks_with_streak_mask_batch,
    streak_mask_batch,
};
pub use streak::{streak_mask_once, CropWindow, StreakMaskContext};

// Re-export core configuration types
pub use crystfind_core::peak::{CandidateOutcome, DegradeReason, Peak, PeakFinderConfig};
pub use crystfind_core::streak::StreakMaskConfig;
