//! Measurement-Interval Orchestration
//!
//! ## Overview
//!
//! [`Pipeline`] ties the main-loop components together and exposes the
//! control surface used by the scheduler and the web interface:
//!
//! ```text
//!                 ┌──────────────── Pipeline ────────────────┐
//!  SampleRing ──→ │ SpectralAnalyzer ──→ Statistics ──→ Model │ ──→ Publisher
//!                 └──────────────────────────────────────────┘
//!                   start / stop / calibrate / reset_accumulator
//! ```
//!
//! One call to [`Pipeline::handle`] is one main-loop iteration. Snapshots
//! are counted against the interval length derived from the publish
//! interval; when the interval is complete the model is finalized, handed
//! to the publisher and reset, all within the same call.
//!
//! ## Construction
//!
//! ```rust
//! use precip_core::pipeline::{IntervalOutcome, Pipeline};
//! use precip_core::config::SensorConfig;
//! use precip_core::model::BinModel;
//! use precip_core::ring::SampleRing;
//! use precip_core::traits::SampleTimer;
//!
//! struct NoTimer;
//! impl SampleTimer for NoTimer {
//!     fn arm(&mut self) {}
//!     fn disarm(&mut self) {}
//! }
//!
//! let ring = SampleRing::<64>::new();
//! let mut pipeline = Pipeline::builder(&ring, NoTimer)
//!     .config(SensorConfig::for_snapshot_len(32))
//!     .build()
//!     .unwrap();
//!
//! pipeline.start_capture();
//! let outcome = pipeline.handle(&mut |_: &BinModel| {}).unwrap();
//! assert_eq!(outcome, IntervalOutcome::Pending);
//! ```

use crate::config::{keys, SensorConfig};
use crate::constants::NR_OF_BINS;
use crate::errors::{CaptureResult, ConfigResult};
use crate::model::{BinModel, PrecipitationKind};
use crate::ring::SampleRing;
use crate::spectral::SpectralAnalyzer;
use crate::statistics::{CalibrationReport, Statistics};
use crate::traits::{KeyValueStore, Publisher, SampleTimer};

/// Result of one main-loop iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalOutcome {
    /// The interval is still collecting snapshots
    Pending,
    /// An interval was finalized, published and reset
    Published(PrecipitationKind),
}

/// Result of [`Pipeline::calibrate`]
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationOutcome {
    /// New thresholds
    pub report: CalibrationReport,
    /// Capture was running and has been paused around the calibration
    pub paused: bool,
}

/// Acquisition and classification pipeline
pub struct Pipeline<'r, T: SampleTimer, const N: usize> {
    analyzer: SpectralAnalyzer<'r, T, N>,
    statistics: Statistics,
    model: BinModel,
    snapshots_per_interval: u32,
    intervals: u32,
}

impl<'r, T: SampleTimer, const N: usize> Pipeline<'r, T, N> {
    /// Start building a pipeline that consumes `ring` and drives `timer`
    pub fn builder(ring: &'r SampleRing<N>, timer: T) -> PipelineBuilder<'r, T, N> {
        PipelineBuilder::new(ring, timer)
    }

    /// Arm the sampling timer
    pub fn start_capture(&mut self) {
        self.analyzer.start_capture();
    }

    /// Disarm the sampling timer; the current interval keeps its snapshots
    ///
    /// Overruns and clipping seen before the timer stopped are counted in
    /// the model.
    pub fn stop_capture(&mut self) {
        if !self.analyzer.is_capturing() {
            return;
        }
        self.analyzer.stop_capture();
        self.analyzer.fold_acquisition(&mut self.model);
    }

    /// True while sampling
    pub fn is_capturing(&self) -> bool {
        self.analyzer.is_capturing()
    }

    /// Recalibrate thresholds from the peaks seen in the current interval
    ///
    /// Capture is paused for the duration when it was running.
    pub fn calibrate(&mut self) -> CalibrationOutcome {
        let paused = self.analyzer.is_capturing();
        if paused {
            self.stop_capture();
        }

        let report = self.statistics.calibrate(&mut self.model);

        if paused {
            self.analyzer.start_capture();
        }
        CalibrationOutcome { report, paused }
    }

    /// Zero the running precipitation total
    pub fn reset_accumulator(&mut self) {
        self.statistics.reset_accumulator(&mut self.model);
    }

    /// Read-only view of the measurement record
    pub fn model(&self) -> &BinModel {
        &self.model
    }

    /// Statistics engine
    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    /// Spectral analyzer
    pub fn analyzer(&self) -> &SpectralAnalyzer<'r, T, N> {
        &self.analyzer
    }

    /// Snapshots making up one interval
    pub fn snapshots_per_interval(&self) -> u32 {
        self.snapshots_per_interval
    }

    /// Intervals published since construction
    pub fn intervals(&self) -> u32 {
        self.intervals
    }

    /// Current thresholds as settings entries for persistence
    pub fn calibration_entries(&self) -> Vec<(String, String)> {
        self.statistics.calibration_entries(&self.model)
    }

    /// One main-loop iteration
    ///
    /// Processes buffered snapshots up to the end of the current interval
    /// and publishes the interval once it is complete. Snapshots beyond the
    /// interval stay in the ring for the next call.
    pub fn handle<P: Publisher>(&mut self, publisher: &mut P) -> CaptureResult<IntervalOutcome> {
        let remaining = self
            .snapshots_per_interval
            .saturating_sub(self.model.snapshot_ctr) as usize;
        self.analyzer
            .handle_bounded(&mut self.model, &self.statistics, remaining)?;

        if self.model.snapshot_ctr >= self.snapshots_per_interval {
            Ok(IntervalOutcome::Published(self.finish_interval(publisher)))
        } else {
            Ok(IntervalOutcome::Pending)
        }
    }

    /// Finalize, publish and reset regardless of the snapshot count
    pub fn finish_interval<P: Publisher>(&mut self, publisher: &mut P) -> PrecipitationKind {
        let kind = self.statistics.finalize(&mut self.model);
        publisher.publish(&self.model);
        self.statistics.reset(&mut self.model);
        self.intervals = self.intervals.wrapping_add(1);

        log_info!(
            "Interval {} published: {}, accumulated amount {}",
            self.intervals,
            kind,
            self.model.precipitation_amount_acc
        );
        kind
    }
}

/// Builder for [`Pipeline`]
pub struct PipelineBuilder<'r, T: SampleTimer, const N: usize> {
    ring: &'r SampleRing<N>,
    timer: T,
    config: SensorConfig,
    calibration: Option<Vec<(String, String)>>,
}

impl<'r, T: SampleTimer, const N: usize> PipelineBuilder<'r, T, N> {
    /// Builder with the default configuration
    pub fn new(ring: &'r SampleRing<N>, timer: T) -> Self {
        Self {
            ring,
            timer,
            config: SensorConfig::default(),
            calibration: None,
        }
    }

    /// Use `config` instead of the defaults
    pub fn config(mut self, config: SensorConfig) -> Self {
        self.config = config;
        self
    }

    /// Restore persisted thresholds from `store` at build time
    pub fn calibration<S: KeyValueStore>(mut self, store: &S) -> Self {
        let prefixes = [keys::GROUP_THRESHOLD_PREFIX, keys::BIN_THRESHOLD_PREFIX];
        let entries = prefixes
            .iter()
            .flat_map(|prefix| (0..NR_OF_BINS).map(move |index| format!("{}{}", prefix, index)))
            .filter_map(|key| store.get(&key).map(|value| (key, value.to_owned())))
            .collect();
        self.calibration = Some(entries);
        self
    }

    /// Validate the configuration and assemble the pipeline
    pub fn build(self) -> ConfigResult<Pipeline<'r, T, N>> {
        let statistics = Statistics::new(&self.config)?;
        let mut model = BinModel::new(&self.config)?;
        let analyzer = SpectralAnalyzer::new(self.ring, self.timer, self.config.snapshot_len)?;

        if let Some(entries) = &self.calibration {
            statistics.load_calibration(&Entries(entries), &mut model);
        }

        Ok(Pipeline {
            analyzer,
            statistics,
            model,
            snapshots_per_interval: self.config.snapshots_per_interval(),
            intervals: 0,
        })
    }
}

struct Entries<'a>(&'a [(String, String)]);

impl KeyValueStore for Entries<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }
}
