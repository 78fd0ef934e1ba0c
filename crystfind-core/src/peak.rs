//! Peak types and peak-finder configuration.

use crate::donut::DonutKernel;
use crate::error::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A detected intensity peak.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Peak {
    /// Centroid row (sub-pixel).
    pub row: f64,
    /// Centroid column (sub-pixel).
    pub col: f64,
    /// Inner-disc pixels at or above the extinction height.
    pub pixel_count: usize,
    /// Background-subtracted inner-disc intensity.
    pub integrated_intensity: f64,
    /// Mean inner signal over background standard deviation.
    pub signal_to_noise: f64,
}

impl Peak {
    /// Returns the peak as `[row, col, npix, atot, son]`, the column order
    /// used by peak-list files.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn to_row(&self) -> [f64; 5] {
        [
            self.row,
            self.col,
            self.pixel_count as f64,
            self.integrated_intensity,
            self.signal_to_noise,
        ]
    }
}

/// Ring statistics measured around one candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RingStatistics {
    /// Mean of the inner disc.
    pub mean_signal: f64,
    /// Mean of the outer ring.
    pub mean_background: f64,
    /// Population standard deviation of the outer ring.
    pub std_background: f64,
    /// Number of inner-disc pixels that contributed.
    pub inner_pixels: usize,
    /// Number of outer-ring pixels that contributed.
    pub outer_pixels: usize,
}

/// Why a candidate's statistics could not be computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DegradeReason {
    /// The statistics window lies entirely outside the frame.
    WindowOutsideFrame,
    /// No inner-disc pixel fell inside the frame.
    EmptyInnerDisc,
    /// No outer-ring pixel fell inside the frame.
    EmptyOuterRing,
    /// A statistic evaluated to NaN (e.g. NaN pixels in the frame).
    NonFinite,
}

/// Per-candidate result of the statistics pass.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CandidateOutcome {
    /// Statistics were computed.
    Measured {
        /// Peak values derived from the statistics.
        peak: Peak,
        /// Raw ring statistics.
        stats: RingStatistics,
    },
    /// Statistics failed; the candidate reports signal-to-noise `0`.
    Degraded {
        /// Candidate position with zeroed statistics.
        peak: Peak,
        /// Failure cause.
        reason: DegradeReason,
    },
}

impl CandidateOutcome {
    /// The peak values, degraded or not.
    #[must_use]
    pub fn peak(&self) -> &Peak {
        match self {
            Self::Measured { peak, .. } | Self::Degraded { peak, .. } => peak,
        }
    }

    /// Returns true when the statistics could not be computed.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

/// Configuration for the peak finder.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PeakFinderConfig {
    /// Minimum pixel count (inclusive).
    pub npix_min: usize,
    /// Maximum pixel count (exclusive).
    pub npix_max: usize,
    /// Minimum background-subtracted integrated intensity.
    pub atot_thr: f64,
    /// Minimum signal-to-noise ratio.
    pub son_min: f64,
    /// h-maxima extinction height; also the pixel-count threshold.
    pub hvalue: f64,
    /// Inner (signal) disc radius in pixels.
    pub inner_radius: f64,
    /// Outer (background) ring radius in pixels.
    pub outer_radius: f64,
}

impl Default for PeakFinderConfig {
    fn default() -> Self {
        Self {
            npix_min: 2,
            npix_max: 30,
            atot_thr: 600.0,
            son_min: 10.0,
            hvalue: 35.0,
            inner_radius: 3.0,
            outer_radius: 6.0,
        }
    }
}

impl PeakFinderConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A configuration that keeps every candidate with finite statistics.
    ///
    /// Useful for inspection and tests; radii and `hvalue` keep their defaults.
    #[must_use]
    pub fn permissive() -> Self {
        Self {
            npix_min: 0,
            npix_max: usize::MAX,
            atot_thr: f64::NEG_INFINITY,
            son_min: f64::NEG_INFINITY,
            ..Self::default()
        }
    }

    /// Sets the pixel-count window `[min, max)`.
    #[must_use]
    pub fn with_npix(mut self, min: usize, max: usize) -> Self {
        self.npix_min = min;
        self.npix_max = max;
        self
    }

    /// Sets the integrated intensity threshold.
    #[must_use]
    pub fn with_atot_thr(mut self, threshold: f64) -> Self {
        self.atot_thr = threshold;
        self
    }

    /// Sets the minimum signal-to-noise ratio.
    #[must_use]
    pub fn with_son_min(mut self, son_min: f64) -> Self {
        self.son_min = son_min;
        self
    }

    /// Sets the h-maxima extinction height.
    #[must_use]
    pub fn with_hvalue(mut self, hvalue: f64) -> Self {
        self.hvalue = hvalue;
        self
    }

    /// Sets the inner and outer ring radii.
    #[must_use]
    pub fn with_radii(mut self, inner: f64, outer: f64) -> Self {
        self.inner_radius = inner;
        self.outer_radius = outer;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns [`Error::ConfigError`] for malformed radii, a NaN or
    /// negative extinction height, NaN thresholds or an empty pixel-count window.
    pub fn validate(&self) -> Result<()> {
        self.kernel().map(|_| ())
    }

    /// Validates the configuration and builds its donut kernel.
    ///
    /// # Errors
    /// See [`Self::validate`].
    pub fn kernel(&self) -> Result<DonutKernel> {
        if self.hvalue.is_nan() || self.hvalue < 0.0 {
            return Err(Error::ConfigError(format!(
                "hvalue must be non-negative, got {}",
                self.hvalue
            )));
        }
        if self.atot_thr.is_nan() || self.son_min.is_nan() {
            return Err(Error::ConfigError(
                "atot_thr and son_min must not be NaN".to_string(),
            ));
        }
        if self.npix_max <= self.npix_min {
            return Err(Error::ConfigError(format!(
                "npix_max ({}) must exceed npix_min ({})",
                self.npix_max, self.npix_min
            )));
        }
        DonutKernel::new(self.inner_radius, self.outer_radius)
    }

    /// Returns true if the peak passes every threshold.
    #[must_use]
    pub fn accepts(&self, peak: &Peak) -> bool {
        peak.signal_to_noise >= self.son_min
            && peak.integrated_intensity >= self.atot_thr
            && peak.pixel_count >= self.npix_min
            && peak.pixel_count < self.npix_max
    }
}
