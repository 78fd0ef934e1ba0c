//! crystfind-core: Core types for X-ray area-detector peak finding.
//!
//! This crate provides the foundational pieces shared by the analysis
//! algorithms: donut (annulus) kernels, peak and configuration types,
//! pixel-mask utilities and the detector-geometry collaborator traits.
//!

pub mod donut;
pub mod error;
pub mod geometry;
pub mod mask;
pub mod peak;
pub mod streak;

pub use donut::{donut_mask, DonutKernel, DonutMask};
pub use error::{ensure_shape, Error, Result};
pub use geometry::{
    edge_indicator, ensure_raw_shape, pixel_enumeration, DetectorGeometry, FrameSource, RawShape,
};
pub use mask::{apply_edit, combine_masks, threshold_mask, MaskSet, MaskTag, MaskingMode};
pub use peak::{CandidateOutcome, DegradeReason, Peak, PeakFinderConfig, RingStatistics};
pub use streak::StreakMaskConfig;
