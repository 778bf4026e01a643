//! Conversion configuration.

use crate::error::{Result, ReturnsError};
use serde::{Deserialize, Serialize};

/// Floating-point tolerance for the round-trip comparison.
///
/// Two values `a` and `b` are considered equal when
/// `|a - b| <= absolute + relative * max(|a|, |b|)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    /// Relative tolerance (default: 1e-9)
    pub relative: f64,
    /// Absolute tolerance, used near zero (default: 1e-12)
    pub absolute: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            relative: 1e-9,
            absolute: 1e-12,
        }
    }
}

impl Tolerance {
    /// Create a tolerance, rejecting negative or non-finite parameters.
    pub fn new(relative: f64, absolute: f64) -> Result<Self> {
        let tolerance = Self { relative, absolute };
        tolerance.check()?;
        Ok(tolerance)
    }

    /// Verify both parameters are finite and non-negative.
    pub fn check(&self) -> Result<()> {
        for value in [self.relative, self.absolute] {
            if !value.is_finite() || value < 0.0 {
                return Err(ReturnsError::InvalidTolerance(value));
            }
        }
        Ok(())
    }

    /// Whether `a` and `b` agree within this tolerance.
    pub fn is_close(&self, a: f64, b: f64) -> bool {
        if a == b {
            return true;
        }
        let scale = a.abs().max(b.abs());
        (a - b).abs() <= self.absolute + self.relative * scale
    }
}

/// Configuration for the MTD to daily log return pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// Round-trip comparison tolerance
    pub tolerance: Tolerance,
    /// Convert month groups on the rayon thread pool (default: false)
    pub parallel: bool,
}

impl ConversionConfig {
    /// Enable or disable parallel conversion of month groups.
    pub const fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Replace the comparison tolerance.
    pub const fn with_tolerance(mut self, tolerance: Tolerance) -> Self {
        self.tolerance = tolerance;
        self
    }
}
