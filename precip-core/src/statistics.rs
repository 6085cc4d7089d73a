//! Interval Statistics and Precipitation Classification
//!
//! ## Overview
//!
//! [`Statistics`] turns a stream of magnitude spectra into one
//! classification per measurement interval:
//!
//! ```text
//! calc(magnitudes) × N ─→ finalize() ─→ PrecipitationKind
//!   peak, sum,              average = sum / N
//!   detections              corrected = average / range factor
//!                           group aggregates, dominant group
//!                           kind + amount
//! ```
//!
//! ## Detection
//!
//! A bin counts a detection in a snapshot when its range-corrected magnitude
//! exceeds the effective threshold
//!
//! ```text
//! effective = threshold × threshold_factor + threshold_offset
//! ```
//!
//! where `threshold` is the bin's own or its group's, depending on the
//! configured [`ThresholdGranularity`]. Under
//! [`AccumulationPolicy::AboveThreshold`] only detecting magnitudes enter
//! the interval sums.
//!
//! ## Group Aggregates
//!
//! Group averages are the sum of the member-bin averages: a group reports
//! the energy of its band, so wide and narrow groups stay comparable to the
//! per-bin thresholds only through calibration, not through bin count.
//!
//! ## Classification
//!
//! Only the index of the dominant group matters:
//!
//! ```text
//! group:  0 ... rain_first-1 | rain_first ... rain_last | rain_last+1 ...
//! kind:        Snow          |          Rain            |     Hail
//! ```
//!
//! A precipitation amount is derived for rain only; it is added to a running
//! total that survives [`Statistics::reset`].
//!
//! ## Division Guards
//!
//! Every division goes through [`ratio_or_zero`]: an interval without
//! snapshots finalizes to zero averages instead of NaN.

#[cfg(feature = "serde")]
use serde::Serialize;

use heapless::Vec as FixedVec;

use crate::config::{
    keys, AccumulationPolicy, SensorConfig, ThresholdGranularity,
};
use crate::constants::MAX_BIN_GROUPS;
use crate::errors::{CaptureError, CaptureResult, ConfigResult};
use crate::lookup::ratio_or_zero;
use crate::model::{BinModel, PrecipitationKind};
use crate::traits::KeyValueStore;

/// Classify a dominant-group index against the rain boundaries
///
/// Both boundaries belong to the rain range.
///
/// ```rust
/// use precip_core::model::PrecipitationKind;
/// use precip_core::statistics::classify;
///
/// assert_eq!(classify(6, 7, 23), PrecipitationKind::Snow);
/// assert_eq!(classify(7, 7, 23), PrecipitationKind::Rain);
/// assert_eq!(classify(24, 7, 23), PrecipitationKind::Hail);
/// ```
pub const fn classify(dominant: usize, rain_first: usize, rain_last: usize) -> PrecipitationKind {
    if dominant < rain_first {
        PrecipitationKind::Snow
    } else if dominant <= rain_last {
        PrecipitationKind::Rain
    } else {
        PrecipitationKind::Hail
    }
}

/// Result of one calibration run
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct CalibrationReport {
    /// Whether thresholds were set per bin or per group
    pub granularity: ThresholdGranularity,
    /// Smallest non-zero peak, or 1.0 when every peak was zero
    pub reference: f32,
    /// New thresholds, one per bin or group
    pub thresholds: Vec<f32>,
}

/// Interval statistics engine
///
/// Holds the tuning parameters read from [`SensorConfig`]; all interval
/// state lives in the [`BinModel`] passed to each operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Statistics {
    bins: usize,
    threshold_factor: f32,
    threshold_offset: f32,
    calibration_floor: f32,
    granularity: ThresholdGranularity,
    accumulation: AccumulationPolicy,
    rain_first: usize,
    rain_last: usize,
    amount_factors: FixedVec<f32, MAX_BIN_GROUPS>,
}

impl Statistics {
    /// Read tuning parameters from a configuration
    pub fn new(config: &SensorConfig) -> ConfigResult<Self> {
        let layout = config.validate()?;
        let amount_factors = config
            .amount_factors
            .iter()
            .take(layout.len())
            .copied()
            .collect();

        Ok(Self {
            bins: config.bins(),
            threshold_factor: config.threshold_factor,
            threshold_offset: config.threshold_offset,
            calibration_floor: config.calibration_floor,
            granularity: config.granularity,
            accumulation: config.accumulation,
            rain_first: config.rain_first_group,
            rain_last: config.rain_last_group,
            amount_factors,
        })
    }

    /// Threshold granularity in use
    pub fn granularity(&self) -> ThresholdGranularity {
        self.granularity
    }

    /// Scale and offset a relative threshold
    #[inline]
    pub fn effective_threshold(&self, threshold: f32) -> f32 {
        threshold * self.threshold_factor + self.threshold_offset
    }

    /// Accumulate one snapshot's magnitude spectrum
    ///
    /// `magnitudes` must hold exactly one value per bin.
    pub fn calc(&self, model: &mut BinModel, magnitudes: &[f32]) -> CaptureResult<()> {
        if magnitudes.len() != self.bins || model.bins.len() != self.bins {
            return Err(CaptureError::SnapshotLength {
                expected: self.bins,
                actual: magnitudes.len(),
            });
        }

        let BinModel { bins, groups, range_correction, .. } = model;

        for group in groups.iter_mut() {
            for index in group.range.bins() {
                let bin = &mut bins[index];
                let magnitude = magnitudes[index];

                bin.magnitude = magnitude;
                if magnitude > bin.peak {
                    bin.peak = magnitude;
                }

                let threshold = match self.granularity {
                    ThresholdGranularity::Bin => bin.threshold,
                    ThresholdGranularity::Group => group.threshold,
                };
                let reciprocal = range_correction.reciprocal(index);
                let detected = magnitude * reciprocal > self.effective_threshold(threshold);

                if detected {
                    bin.detections += 1;
                    group.detections += 1;
                    group.weighted_detections += reciprocal;
                }

                if detected || self.accumulation == AccumulationPolicy::All {
                    bin.sum += magnitude;
                }
            }
        }

        model.snapshot_ctr += 1;
        Ok(())
    }

    /// Derive interval statistics and classify
    ///
    /// Safe to call with zero snapshots: every average is then zero and the
    /// lowest group is dominant.
    pub fn finalize(&self, model: &mut BinModel) -> PrecipitationKind {
        let snapshots = model.snapshot_ctr as f32;

        for (index, bin) in model.bins.iter_mut().enumerate() {
            bin.average = ratio_or_zero(bin.sum, snapshots);
            bin.corrected_average = model.range_correction.correct(index, bin.average);
        }

        // Overall figures leave out the DC bin
        let spectrum = model.bins.get(1..).unwrap_or(&[]);
        let divisor = spectrum.len() as f32;
        model.peak = spectrum.iter().map(|b| b.peak).fold(0.0, f32::max);
        model.average = ratio_or_zero(spectrum.iter().map(|b| b.average).sum(), divisor);
        model.corrected_average =
            ratio_or_zero(spectrum.iter().map(|b| b.corrected_average).sum(), divisor);
        model.total_detections = spectrum.iter().map(|b| b.detections).sum();

        for group in model.groups.iter_mut() {
            let members = &model.bins[group.range.bins()];
            group.sum = members.iter().map(|b| b.sum).sum();
            group.average = members.iter().map(|b| b.average).sum();
            group.corrected_average = members.iter().map(|b| b.corrected_average).sum();
            group.peak = members.iter().map(|b| b.peak).fold(0.0, f32::max);
        }

        let dominant = first_max(model.groups.iter().map(|g| g.corrected_average));
        let by_detections = first_max(model.groups.iter().map(|g| g.weighted_detections));
        for (index, group) in model.groups.iter_mut().enumerate() {
            group.is_dominant = index == dominant;
            group.is_dominant_by_detections = index == by_detections;
        }
        model.dominant_group = dominant;
        model.dominant_group_by_detections = by_detections;

        let kind = classify(dominant, self.rain_first, self.rain_last);
        model.precipitation_amount = match kind {
            PrecipitationKind::Rain => model
                .groups
                .iter()
                .zip(self.amount_factors.iter())
                .map(|(group, factor)| group.corrected_average * factor)
                .sum(),
            PrecipitationKind::Snow | PrecipitationKind::Hail => 0.0,
        };
        model.precipitation_amount_acc += model.precipitation_amount;
        model.precipitation = Some(kind);

        log_debug!(
            "Interval finalized: {} snapshots, dominant group {} ({} by detections), {} amount {}",
            model.snapshot_ctr,
            dominant,
            by_detections,
            kind,
            model.precipitation_amount
        );

        kind
    }

    /// Set thresholds from the peaks observed so far
    ///
    /// Each threshold is the bin's (or group's) peak relative to the
    /// smallest non-zero peak. A zero peak is replaced by the calibration
    /// floor so no threshold becomes zero.
    pub fn calibrate(&self, model: &mut BinModel) -> CalibrationReport {
        let peaks: Vec<f32> = match self.granularity {
            ThresholdGranularity::Bin => model.bins.iter().map(|b| b.peak).collect(),
            ThresholdGranularity::Group => model
                .groups
                .iter()
                .map(|g| {
                    model.bins[g.range.bins()]
                        .iter()
                        .map(|b| b.peak)
                        .fold(0.0, f32::max)
                })
                .collect(),
        };

        let reference = peaks
            .iter()
            .copied()
            .filter(|p| *p > 0.0)
            .fold(None, |min: Option<f32>, p| Some(min.map_or(p, |m| m.min(p))))
            .unwrap_or(1.0);

        let thresholds: Vec<f32> = peaks
            .iter()
            .map(|&peak| {
                let peak = if peak > 0.0 { peak } else { self.calibration_floor };
                ratio_or_zero(peak, reference)
            })
            .collect();

        self.apply_thresholds(model, &thresholds);

        log_info!(
            "Calibrated {} thresholds against reference peak {}",
            thresholds.len(),
            reference
        );

        CalibrationReport {
            granularity: self.granularity,
            reference,
            thresholds,
        }
    }

    /// Zero the interval; thresholds and the running total are kept
    pub fn reset(&self, model: &mut BinModel) {
        model.reset_interval();
    }

    /// Zero the running precipitation total
    pub fn reset_accumulator(&self, model: &mut BinModel) {
        model.precipitation_amount_acc = 0.0;
    }

    /// Current thresholds as settings entries (`BGC<n>` or `BC<n>`)
    pub fn calibration_entries(&self, model: &BinModel) -> Vec<(String, String)> {
        let prefix = self.threshold_prefix();
        self.thresholds(model)
            .into_iter()
            .enumerate()
            .map(|(index, value)| (format!("{}{}", prefix, index), format!("{:.4}", value)))
            .collect()
    }

    /// Restore thresholds persisted by [`calibration_entries`](Self::calibration_entries)
    ///
    /// Missing or unparsable entries fall back to 1.0.
    pub fn load_calibration<S: KeyValueStore>(&self, store: &S, model: &mut BinModel) {
        let prefix = self.threshold_prefix();
        let count = match self.granularity {
            ThresholdGranularity::Bin => model.bins.len(),
            ThresholdGranularity::Group => model.groups.len(),
        };

        let thresholds: Vec<f32> = (0..count)
            .map(|index| {
                store
                    .get(&format!("{}{}", prefix, index))
                    .and_then(|raw| raw.trim().parse::<f32>().ok())
                    .filter(|value| value.is_finite())
                    .unwrap_or(1.0)
            })
            .collect();

        self.apply_thresholds(model, &thresholds);
    }

    fn threshold_prefix(&self) -> &'static str {
        match self.granularity {
            ThresholdGranularity::Bin => keys::BIN_THRESHOLD_PREFIX,
            ThresholdGranularity::Group => keys::GROUP_THRESHOLD_PREFIX,
        }
    }

    fn thresholds(&self, model: &BinModel) -> Vec<f32> {
        match self.granularity {
            ThresholdGranularity::Bin => model.bins.iter().map(|b| b.threshold).collect(),
            ThresholdGranularity::Group => model.groups.iter().map(|g| g.threshold).collect(),
        }
    }

    fn apply_thresholds(&self, model: &mut BinModel, thresholds: &[f32]) {
        match self.granularity {
            ThresholdGranularity::Bin => {
                for (bin, &threshold) in model.bins.iter_mut().zip(thresholds) {
                    bin.threshold = threshold;
                }
            }
            ThresholdGranularity::Group => {
                for (group, &threshold) in model.groups.iter_mut().zip(thresholds) {
                    group.threshold = threshold;
                }
            }
        }
    }
}

/// Index of the first strictly greatest value; 0 for an empty or all-equal
/// sequence
fn first_max(values: impl Iterator<Item = f32>) -> usize {
    let mut best = 0;
    let mut best_value = f32::NEG_INFINITY;
    for (index, value) in values.enumerate() {
        if value > best_value {
            best = index;
            best_value = value;
        }
    }
    best
}
