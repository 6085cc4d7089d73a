//! Common mocks and fixtures for integration tests
//!
//! This module provides:
//! - Mock collaborators for the interrupt and publisher seams
//! - Small configurations with hand-checkable numbers
//! - Signal and spectrum generators (see [`generators`])

#![allow(dead_code)]

use std::cell::Cell;
use std::rc::Rc;

use precip_core::{
    config::SensorConfig,
    model::BinModel,
    traits::{AdcChannel, Publisher, SampleTimer},
};

pub mod generators;

/// ADC that plays back a fixed sequence of raw codes, wrapping around
pub struct MockAdc {
    codes: Vec<u16>,
    position: usize,
    reads: u64,
}

impl MockAdc {
    pub fn new(codes: Vec<u16>) -> Self {
        assert!(!codes.is_empty(), "MockAdc needs at least one code");
        Self { codes, position: 0, reads: 0 }
    }

    /// Number of conversions performed
    pub fn reads(&self) -> u64 {
        self.reads
    }
}

impl AdcChannel for MockAdc {
    fn read_raw(&mut self) -> u16 {
        let code = self.codes[self.position];
        self.position = (self.position + 1) % self.codes.len();
        self.reads += 1;
        code
    }
}

/// Shared view of a [`MockTimer`]'s state
#[derive(Default)]
pub struct TimerLog {
    pub armed: Cell<bool>,
    pub arms: Cell<u32>,
    pub disarms: Cell<u32>,
}

/// Timer that records arm/disarm calls into a shared log
#[derive(Clone, Default)]
pub struct MockTimer {
    log: Rc<TimerLog>,
}

impl MockTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to inspect the timer after it moved into the pipeline
    pub fn log(&self) -> Rc<TimerLog> {
        Rc::clone(&self.log)
    }
}

impl SampleTimer for MockTimer {
    fn arm(&mut self) {
        self.log.armed.set(true);
        self.log.arms.set(self.log.arms.get() + 1);
    }

    fn disarm(&mut self) {
        self.log.armed.set(false);
        self.log.disarms.set(self.log.disarms.get() + 1);
    }
}

/// Publisher keeping a copy of every published model
#[derive(Default)]
pub struct RecordingPublisher {
    pub published: Vec<BinModel>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<&BinModel> {
        self.published.last()
    }
}

impl Publisher for RecordingPublisher {
    fn publish(&mut self, model: &BinModel) {
        self.published.push(model.clone());
    }
}

/// 4 bins in groups [0-1] and [2-3] with the default dwell table
pub fn four_bin_config() -> SensorConfig {
    SensorConfig::for_snapshot_len(8).with_group_bounds(vec![1, 3])
}

/// 16 bins in 4 groups of 4, flat range correction, groups 1..=2 are rain
///
/// At 32 samples per snapshot one second is 1280 snapshots.
pub fn sixteen_bin_config() -> SensorConfig {
    let mut config = SensorConfig::for_snapshot_len(32)
        .with_group_bounds(vec![3, 7, 11, 15])
        .with_range_correction(vec![1.0; 16])
        .with_rain_groups(1, 2);
    config.publish_interval_s = 1;
    config
}
