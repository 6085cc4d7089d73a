//! Per-Bin and Per-Group Interval Statistics
//!
//! ## Overview
//!
//! [`BinModel`] is the sensor's measurement record. It holds one [`Bin`] per
//! positive-frequency FFT bin, one [`BinGroup`] per configured band, and the
//! interval-wide scalars that the publisher reports.
//!
//! ```text
//! BinModel
//! ├── bins:   [Bin; NR_OF_BINS]        magnitude, peak, sum, averages, threshold
//! ├── groups: [BinGroup; ≤ 32]         aggregated over member bins
//! ├── range_correction                 dwell factor per bin
//! └── interval scalars                 counters, overall averages, dominant
//!                                      group, precipitation kind and amount
//! ```
//!
//! ## Ownership
//!
//! The model is created once from a validated [`SensorConfig`] and mutated
//! only by [`Statistics`](crate::statistics::Statistics) and the spectral
//! analyzer on the main loop. Everything outside the crate sees it through
//! shared references, which makes the published view read-only.
//!
//! ## Lifecycle
//!
//! ```text
//! new ─→ Calc × N ─→ Finalize ─→ publish ─→ Reset ─┐
//!          ↑                                       │
//!          └───────────────────────────────────────┘
//! ```
//!
//! Reset zeroes everything that belongs to one interval. Calibrated
//! thresholds and the running precipitation total survive it.

use core::fmt;

use heapless::Vec as FixedVec;
#[cfg(feature = "serde")]
use serde::Serialize;

use crate::config::{BinGroupRange, SensorConfig};
use crate::constants::{ADC_MIDPOINT, MAX_BIN_GROUPS};
use crate::errors::ConfigResult;
use crate::lookup::RangeCorrection;

/// Precipitation type decided from the dominant group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[repr(u8)]
pub enum PrecipitationKind {
    /// Dominant group below the rain range
    Snow = 0,
    /// Dominant group inside the rain range
    Rain = 1,
    /// Dominant group above the rain range
    Hail = 2,
}

impl PrecipitationKind {
    /// Lowercase name used in published reports
    pub const fn name(&self) -> &'static str {
        match self {
            PrecipitationKind::Snow => "snow",
            PrecipitationKind::Rain => "rain",
            PrecipitationKind::Hail => "hail",
        }
    }
}

impl fmt::Display for PrecipitationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for PrecipitationKind {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{}", self.name())
    }
}

/// Statistics of one FFT bin
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Bin {
    /// Magnitude of the latest snapshot
    pub magnitude: f32,
    /// Largest magnitude this interval
    pub peak: f32,
    /// Accumulated magnitude this interval
    pub sum: f32,
    /// `sum / snapshots`, set by Finalize
    pub average: f32,
    /// `average / range factor`, set by Finalize
    pub corrected_average: f32,
    /// Calibrated relative threshold
    pub threshold: f32,
    /// Snapshots in which this bin exceeded its effective threshold
    pub detections: u32,
}

impl Bin {
    const fn new() -> Self {
        Self {
            magnitude: 0.0,
            peak: 0.0,
            sum: 0.0,
            average: 0.0,
            corrected_average: 0.0,
            threshold: 1.0,
            detections: 0,
        }
    }

    fn reset_interval(&mut self) {
        *self = Self { threshold: self.threshold, ..Self::new() };
    }
}

/// Statistics of one contiguous band of bins
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct BinGroup {
    /// Member bins
    pub range: BinGroupRange,
    /// Largest member peak
    pub peak: f32,
    /// Sum of member sums
    pub sum: f32,
    /// Sum of member averages
    pub average: f32,
    /// Sum of member corrected averages
    pub corrected_average: f32,
    /// Calibrated relative threshold
    pub threshold: f32,
    /// Member-bin detections
    pub detections: u32,
    /// Detections weighted by `1 / range factor` of the detecting bin
    pub weighted_detections: f32,
    /// Highest corrected average this interval
    pub is_dominant: bool,
    /// Highest weighted detection count this interval
    pub is_dominant_by_detections: bool,
}

impl BinGroup {
    const fn new(range: BinGroupRange) -> Self {
        Self {
            range,
            peak: 0.0,
            sum: 0.0,
            average: 0.0,
            corrected_average: 0.0,
            threshold: 1.0,
            detections: 0,
            weighted_detections: 0.0,
            is_dominant: false,
            is_dominant_by_detections: false,
        }
    }

    fn reset_interval(&mut self) {
        *self = Self { threshold: self.threshold, ..Self::new(self.range) };
    }
}

/// Measurement record for one interval
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct BinModel {
    pub(crate) bins: Vec<Bin>,
    pub(crate) groups: FixedVec<BinGroup, MAX_BIN_GROUPS>,
    pub(crate) range_correction: RangeCorrection,

    pub(crate) snapshot_ctr: u32,
    pub(crate) sample_ctr: u32,
    pub(crate) clipping_ctr: u32,
    pub(crate) overflow_ctr: u32,
    pub(crate) adc_peak_sample: u16,
    pub(crate) adc_offset: f32,

    pub(crate) total_detections: u32,
    pub(crate) peak: f32,
    pub(crate) average: f32,
    pub(crate) corrected_average: f32,
    pub(crate) dominant_group: usize,
    pub(crate) dominant_group_by_detections: usize,
    pub(crate) precipitation: Option<PrecipitationKind>,
    pub(crate) precipitation_amount: f32,
    pub(crate) precipitation_amount_acc: f32,
}

impl BinModel {
    /// Allocate bins and groups for a configuration
    ///
    /// Fails when the configuration does not validate. All thresholds start
    /// at 1.0.
    pub fn new(config: &SensorConfig) -> ConfigResult<Self> {
        let layout = config.validate()?;
        let range_correction = RangeCorrection::from_factors(config.range_correction.clone())?;

        Ok(Self {
            bins: vec![Bin::new(); config.bins()],
            groups: layout.iter().map(|range| BinGroup::new(*range)).collect(),
            range_correction,
            snapshot_ctr: 0,
            sample_ctr: 0,
            clipping_ctr: 0,
            overflow_ctr: 0,
            adc_peak_sample: 0,
            adc_offset: 0.0,
            total_detections: 0,
            peak: 0.0,
            average: 0.0,
            corrected_average: 0.0,
            dominant_group: 0,
            dominant_group_by_detections: 0,
            precipitation: None,
            precipitation_amount: 0.0,
            precipitation_amount_acc: 0.0,
        })
    }

    /// Zero every per-interval field; keeps thresholds and the running total
    pub fn reset_interval(&mut self) {
        self.bins.iter_mut().for_each(Bin::reset_interval);
        self.groups.iter_mut().for_each(BinGroup::reset_interval);

        self.snapshot_ctr = 0;
        self.sample_ctr = 0;
        self.clipping_ctr = 0;
        self.overflow_ctr = 0;
        self.adc_peak_sample = 0;
        self.adc_offset = 0.0;
        self.total_detections = 0;
        self.peak = 0.0;
        self.average = 0.0;
        self.corrected_average = 0.0;
        self.dominant_group = 0;
        self.dominant_group_by_detections = 0;
        self.precipitation = None;
        self.precipitation_amount = 0.0;
    }

    /// Per-bin statistics
    pub fn bins(&self) -> &[Bin] {
        &self.bins
    }

    /// Per-group statistics
    pub fn groups(&self) -> &[BinGroup] {
        &self.groups
    }

    /// Range-correction table
    pub fn range_correction(&self) -> &RangeCorrection {
        &self.range_correction
    }

    /// Snapshots accumulated this interval
    pub fn snapshot_ctr(&self) -> u32 {
        self.snapshot_ctr
    }

    /// Conversions pushed by the sampling interrupt this interval
    ///
    /// Includes samples later dropped by an overrun or a capture stop.
    pub fn sample_ctr(&self) -> u32 {
        self.sample_ctr
    }

    /// Clipped conversions this interval
    pub fn clipping_ctr(&self) -> u32 {
        self.clipping_ctr
    }

    /// Ring overruns observed this interval
    pub fn overflow_ctr(&self) -> u32 {
        self.overflow_ctr
    }

    /// Largest |sample| this interval
    pub fn adc_peak_sample(&self) -> u16 {
        self.adc_peak_sample
    }

    /// ADC peak as a percentage of half scale, capped at 100
    pub fn adc_peak_percent(&self) -> f32 {
        let peak = self.adc_peak_sample.min(ADC_MIDPOINT);
        100.0 * peak as f32 / ADC_MIDPOINT as f32
    }

    /// Mean centred sample of the latest snapshot
    pub fn adc_offset(&self) -> f32 {
        self.adc_offset
    }

    /// Detections over all bins except bin 0
    pub fn total_detections(&self) -> u32 {
        self.total_detections
    }

    /// Largest bin peak, bin 0 excluded
    pub fn peak(&self) -> f32 {
        self.peak
    }

    /// Mean bin average, bin 0 excluded
    pub fn average(&self) -> f32 {
        self.average
    }

    /// Mean corrected bin average, bin 0 excluded
    pub fn corrected_average(&self) -> f32 {
        self.corrected_average
    }

    /// Group with the highest corrected average
    pub fn dominant_group(&self) -> usize {
        self.dominant_group
    }

    /// Group with the highest weighted detection count
    pub fn dominant_group_by_detections(&self) -> usize {
        self.dominant_group_by_detections
    }

    /// Classification of the last finalized interval
    pub fn precipitation(&self) -> Option<PrecipitationKind> {
        self.precipitation
    }

    /// Precipitation amount of the last finalized interval
    pub fn precipitation_amount(&self) -> f32 {
        self.precipitation_amount
    }

    /// Amount accumulated across intervals since the last accumulator reset
    pub fn precipitation_amount_acc(&self) -> f32 {
        self.precipitation_amount_acc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_model() -> BinModel {
        let config = SensorConfig::for_snapshot_len(8)
            .with_group_bounds(vec![1, 3])
            .with_range_correction(vec![1.0, 2.0, 4.0, 8.0]);
        BinModel::new(&config).unwrap()
    }

    #[test]
    fn sized_from_config() {
        let model = small_model();
        assert_eq!(model.bins().len(), 4);
        assert_eq!(model.groups().len(), 2);
        assert_eq!(model.groups()[1].range, BinGroupRange { first_bin: 2, last_bin: 3 });
        assert!(model.bins().iter().all(|b| b.threshold == 1.0));
        assert_eq!(model.precipitation(), None);
    }

    #[test]
    fn reset_keeps_thresholds_and_total() {
        let mut model = small_model();
        model.bins[2].sum = 50.0;
        model.bins[2].threshold = 3.0;
        model.groups[0].threshold = 0.5;
        model.groups[0].is_dominant = true;
        model.snapshot_ctr = 7;
        model.sample_ctr = 7 * 8;
        model.precipitation = Some(PrecipitationKind::Rain);
        model.precipitation_amount = 1.5;
        model.precipitation_amount_acc = 4.5;

        model.reset_interval();

        assert_eq!(model.bins[2].sum, 0.0);
        assert_eq!(model.bins[2].threshold, 3.0);
        assert_eq!(model.groups[0].threshold, 0.5);
        assert!(!model.groups[0].is_dominant);
        assert_eq!(model.snapshot_ctr(), 0);
        assert_eq!(model.sample_ctr(), 0);
        assert_eq!(model.precipitation(), None);
        assert_eq!(model.precipitation_amount(), 0.0);
        assert_eq!(model.precipitation_amount_acc(), 4.5);
    }

    #[test]
    fn peak_percent_is_capped() {
        let mut model = small_model();
        model.adc_peak_sample = 1024;
        assert_eq!(model.adc_peak_percent(), 50.0);
        model.adc_peak_sample = 4000;
        assert_eq!(model.adc_peak_percent(), 100.0);
    }

    #[test]
    fn kind_names() {
        assert_eq!(PrecipitationKind::Hail.to_string(), "hail");
        assert_eq!(PrecipitationKind::Snow as u8, 0);
    }
}
