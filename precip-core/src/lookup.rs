//! Pre-Computed Range-Correction Table
//!
//! ## Motivation
//!
//! A falling drop is visible to the transducer for a number of consecutive
//! snapshots that depends on its speed, and its speed determines the Doppler
//! bin it lands in. Slow particles (low bins) stay in the field of view for
//! hundreds of snapshots and would be counted again and again; fast ones
//! (high bins) pass in a snapshot or two. Dividing each bin's average by its
//! expected dwell time normalises the spectrum to "events per snapshot".
//!
//! ### Dwell Model
//!
//! ```text
//! dwell(0) = 1                          (DC term, left untouched)
//! dwell(k) = DROP_DWELL_SNAPSHOTS_BIN1 / k
//!
//! bin 1   → 322.67 snapshots
//! bin 2   → 161.33 snapshots
//! bin 511 →   0.63 snapshots
//! ```
//!
//! The factors are device-specific; the dwell model is only the default.
//! A calibrated table can be supplied through the configuration.
//!
//! ## Implementation Details
//!
//! Calc runs once per snapshot for every bin, so the reciprocal of each
//! factor is computed once at construction and the per-snapshot detection
//! test multiplies instead of dividing. Interval statistics divide by the
//! factor itself.

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::constants::DROP_DWELL_SNAPSHOTS_BIN1;
use crate::errors::{ConfigError, ConfigResult};

/// Divide, defining the result as zero when the denominator is zero or not
/// finite.
#[inline]
pub fn ratio_or_zero(numerator: f32, denominator: f32) -> f32 {
    if denominator == 0.0 || !denominator.is_finite() {
        0.0
    } else {
        numerator / denominator
    }
}

/// Per-bin range-correction factors
///
/// Owned by the [`BinModel`](crate::model::BinModel) and immutable after
/// construction.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct RangeCorrection {
    /// Expected dwell of one event in each bin, in snapshots
    factors: Vec<f32>,
    /// `1 / factors[bin]`
    #[cfg_attr(feature = "serde", serde(skip))]
    reciprocals: Vec<f32>,
}

impl RangeCorrection {
    /// Default dwell-model table for `bins` bins
    pub fn dwell_model(bins: usize) -> Self {
        let factors = dwell_model_factors(bins);
        let reciprocals = factors.iter().map(|f| 1.0 / f).collect();
        Self { factors, reciprocals }
    }

    /// Build a table from explicit factors
    ///
    /// Every factor must be finite and strictly positive, since it is used
    /// as a divisor.
    pub fn from_factors(factors: Vec<f32>) -> ConfigResult<Self> {
        if let Some(index) = factors.iter().position(|f| !f.is_finite() || *f <= 0.0) {
            return Err(ConfigError::InvalidFactor {
                table: "range_correction",
                index,
            });
        }
        let reciprocals = factors.iter().map(|f| 1.0 / f).collect();
        Ok(Self { factors, reciprocals })
    }

    /// Number of bins covered
    pub fn len(&self) -> usize {
        self.factors.len()
    }

    /// True when the table covers no bins
    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    /// Dwell factor for `bin` (1.0 outside the table)
    pub fn factor(&self, bin: usize) -> f32 {
        self.factors.get(bin).copied().unwrap_or(1.0)
    }

    /// Reciprocal dwell factor for `bin` (1.0 outside the table)
    #[inline]
    pub fn reciprocal(&self, bin: usize) -> f32 {
        self.reciprocals.get(bin).copied().unwrap_or(1.0)
    }

    /// Range-corrected value for `bin`
    #[inline]
    pub fn correct(&self, bin: usize, value: f32) -> f32 {
        ratio_or_zero(value, self.factor(bin))
    }

    /// Raw factors
    pub fn factors(&self) -> &[f32] {
        &self.factors
    }
}

/// Default dwell factors for `bins` bins
pub fn dwell_model_factors(bins: usize) -> Vec<f32> {
    (0..bins)
        .map(|bin| {
            if bin == 0 {
                1.0
            } else {
                DROP_DWELL_SNAPSHOTS_BIN1 / bin as f32
            }
        })
        .collect()
}
