//! Streak-mask configuration.

use crate::error::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for the streak mask generator.
///
/// Both values feed the cached crop bounds and the hot-pixel threshold, so a
/// change requires building a new streak-mask context.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct StreakMaskConfig {
    /// Side of the square crop around the detector center (maximum streak length).
    pub width: usize,
    /// Hot-pixel threshold in standard deviations above the mean.
    pub sigma: f64,
}

impl Default for StreakMaskConfig {
    fn default() -> Self {
        Self {
            width: 300,
            sigma: 1.0,
        }
    }
}

impl StreakMaskConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the crop width.
    #[must_use]
    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }

    /// Sets the sigma multiplier.
    #[must_use]
    pub fn with_sigma(mut self, sigma: f64) -> Self {
        self.sigma = sigma;
        self
    }

    /// Half of the crop width, rounded down.
    #[must_use]
    pub fn half_width(&self) -> usize {
        self.width / 2
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns [`Error::ConfigError`] if the crop would be empty or sigma is not finite.
    pub fn validate(&self) -> Result<()> {
        if self.half_width() == 0 {
            return Err(Error::ConfigError(format!(
                "streak width must be at least 2, got {}",
                self.width
            )));
        }
        if !self.sigma.is_finite() {
            return Err(Error::ConfigError(format!(
                "streak sigma must be finite, got {}",
                self.sigma
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StreakMaskConfig::default();
        assert_eq!(config.width, 300);
        assert_eq!(config.half_width(), 150);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_odd_width_rounds_down() {
        let config = StreakMaskConfig::new().with_width(251).with_sigma(2.0);
        assert_eq!(config.half_width(), 125);
        assert!((config.sigma - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_validation() {
        assert!(StreakMaskConfig::new().with_width(1).validate().is_err());
        assert!(StreakMaskConfig::new()
            .with_sigma(f64::INFINITY)
            .validate()
            .is_err());
    }
}
