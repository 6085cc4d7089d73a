//! Sensor Configuration
//!
//! ## Overview
//!
//! Everything the classification core needs at runtime is read once at
//! startup into a [`SensorConfig`]. The sample rate and the snapshot length
//! used in production are build-time constants (see [`crate::constants`]);
//! the remaining values come from the persisted key/value settings and are
//! validated before capture starts.
//!
//! ## Bin Groups
//!
//! Bins are partitioned into contiguous groups described by one upper bin
//! index per group:
//!
//! ```text
//! upper bins: [1, 3]          4 bins, 2 groups
//!
//! bin:    0   1 | 2   3
//! group:  ──0── | ──1──
//! ```
//!
//! The bounds must increase strictly and the last one must be the last
//! bin, so the groups cover `[0, bins)` without gaps or overlap.
//!
//! ## Settings Text
//!
//! The firmware persists its settings as one string:
//!
//! ```text
//! SETUP GroupBounds 15 31 47; ThresholdFactor 2.5; RainFirst 7;
//! ```
//!
//! [`SettingsText`] parses and renders that format and serves as a
//! [`KeyValueStore`] for [`SensorConfig::from_store`].

use core::fmt;
use core::ops::RangeInclusive;
use core::str::FromStr;

use heapless::Vec as FixedVec;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CALIBRATION_FLOOR, DEFAULT_PUBLISH_INTERVAL_S, DEFAULT_RAIN_FIRST_GROUP,
    DEFAULT_RAIN_LAST_GROUP, DEFAULT_THRESHOLD_FACTOR, DEFAULT_THRESHOLD_OFFSET, MAX_BIN_GROUPS,
    MIN_SNAPSHOT_LEN, SAMPLE_RATE_HZ, SNAPSHOT_LEN,
};
use crate::errors::{ConfigError, ConfigResult};
use crate::lookup::{dwell_model_factors, RangeCorrection};
use crate::traits::KeyValueStore;

/// Settings keys understood by [`SensorConfig::from_store`]
pub mod keys {
    /// Upper bin of every group, space or comma separated
    pub const GROUP_BOUNDS: &str = "GroupBounds";
    /// Threshold scale factor
    pub const THRESHOLD_FACTOR: &str = "ThresholdFactor";
    /// Threshold offset
    pub const THRESHOLD_OFFSET: &str = "ThresholdOffset";
    /// Value substituted for zero peaks during calibration
    pub const CALIBRATION_FLOOR: &str = "CalibrationFloor";
    /// First dominant group classified as rain
    pub const RAIN_FIRST: &str = "RainFirst";
    /// Last dominant group classified as rain
    pub const RAIN_LAST: &str = "RainLast";
    /// Measurement interval in seconds
    pub const PUBLISH_INTERVAL: &str = "PublishInterval";
    /// Per-group precipitation amount factors
    pub const AMOUNT_FACTORS: &str = "AmountFactors";
    /// Threshold granularity, `group` or `bin`
    pub const GRANULARITY: &str = "Granularity";
    /// Accumulation policy, `all` or `above`
    pub const ACCUMULATE: &str = "Accumulate";
    /// Prefix of persisted per-group thresholds (`BGC0`, `BGC1`, ...)
    pub const GROUP_THRESHOLD_PREFIX: &str = "BGC";
    /// Prefix of persisted per-bin thresholds (`BC0`, `BC1`, ...)
    pub const BIN_THRESHOLD_PREFIX: &str = "BC";
}

/// Whether detection thresholds are kept per group or per bin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ThresholdGranularity {
    /// One threshold shared by all bins of a group
    #[default]
    Group,
    /// One threshold per bin
    Bin,
}

/// Which magnitudes enter the interval sums
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AccumulationPolicy {
    /// Every magnitude is accumulated
    #[default]
    All,
    /// Only magnitudes whose corrected value exceeds the detection
    /// threshold; sub-threshold energy is treated as noise
    AboveThreshold,
}

impl FromStr for ThresholdGranularity {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "group" => Ok(Self::Group),
            "bin" => Ok(Self::Bin),
            _ => Err(()),
        }
    }
}

impl FromStr for AccumulationPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "above" => Ok(Self::AboveThreshold),
            _ => Err(()),
        }
    }
}

/// Inclusive range of bins forming one group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BinGroupRange {
    /// First member bin
    pub first_bin: usize,
    /// Last member bin
    pub last_bin: usize,
}

impl BinGroupRange {
    /// Number of member bins
    pub fn len(&self) -> usize {
        self.last_bin - self.first_bin + 1
    }

    /// Always false; a group holds at least one bin
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Member bin indices
    pub fn bins(&self) -> RangeInclusive<usize> {
        self.first_bin..=self.last_bin
    }

    /// True when `bin` belongs to this group
    pub fn contains(&self, bin: usize) -> bool {
        self.bins().contains(&bin)
    }
}

/// Validated partition of the bin range into groups
pub type BinGroupLayout = FixedVec<BinGroupRange, MAX_BIN_GROUPS>;

/// Runtime configuration of the classification core
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SensorConfig {
    /// Samples per snapshot; power of two
    pub snapshot_len: usize,
    /// Upper bin index of every group, strictly increasing
    pub group_upper_bins: Vec<usize>,
    /// Per-bin range-correction factors (dwell in snapshots)
    pub range_correction: Vec<f32>,
    /// Per-group factor converting corrected average to precipitation amount
    pub amount_factors: Vec<f32>,
    /// Multiplier applied to calibrated thresholds
    pub threshold_factor: f32,
    /// Offset added to scaled thresholds
    pub threshold_offset: f32,
    /// Replacement for zero peaks during calibration
    pub calibration_floor: f32,
    /// Threshold granularity
    pub granularity: ThresholdGranularity,
    /// Accumulation policy
    pub accumulation: AccumulationPolicy,
    /// First dominant group classified as rain
    pub rain_first_group: usize,
    /// Last dominant group classified as rain
    pub rain_last_group: usize,
    /// Measurement interval in seconds
    pub publish_interval_s: u32,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self::for_snapshot_len(SNAPSHOT_LEN)
    }
}

impl SensorConfig {
    /// Defaults for a transform of `snapshot_len` samples
    ///
    /// Groups split the bins evenly (up to [`MAX_BIN_GROUPS`] of them), the
    /// range correction follows the dwell model and every amount factor is 1.
    pub fn for_snapshot_len(snapshot_len: usize) -> Self {
        let bins = snapshot_len / 2;
        let group_upper_bins = equal_group_bounds(bins, MAX_BIN_GROUPS.min(bins.max(1)));
        let groups = group_upper_bins.len();
        Self {
            snapshot_len,
            group_upper_bins,
            range_correction: dwell_model_factors(bins),
            amount_factors: vec![1.0; groups],
            threshold_factor: DEFAULT_THRESHOLD_FACTOR,
            threshold_offset: DEFAULT_THRESHOLD_OFFSET,
            calibration_floor: DEFAULT_CALIBRATION_FLOOR,
            granularity: ThresholdGranularity::default(),
            accumulation: AccumulationPolicy::default(),
            rain_first_group: DEFAULT_RAIN_FIRST_GROUP,
            rain_last_group: DEFAULT_RAIN_LAST_GROUP,
            publish_interval_s: DEFAULT_PUBLISH_INTERVAL_S,
        }
    }

    /// Replace the group bounds; amount factors are reset to 1 per group
    pub fn with_group_bounds(mut self, upper_bins: Vec<usize>) -> Self {
        self.amount_factors = vec![1.0; upper_bins.len()];
        self.group_upper_bins = upper_bins;
        self
    }

    /// Replace the range-correction table
    pub fn with_range_correction(mut self, factors: Vec<f32>) -> Self {
        self.range_correction = factors;
        self
    }

    /// Replace the per-group amount factors
    pub fn with_amount_factors(mut self, factors: Vec<f32>) -> Self {
        self.amount_factors = factors;
        self
    }

    /// Set the dominant-group range classified as rain
    pub fn with_rain_groups(mut self, first: usize, last: usize) -> Self {
        self.rain_first_group = first;
        self.rain_last_group = last;
        self
    }

    /// Set threshold scale factor and offset
    pub fn with_threshold(mut self, factor: f32, offset: f32) -> Self {
        self.threshold_factor = factor;
        self.threshold_offset = offset;
        self
    }

    /// Set threshold granularity
    pub fn with_granularity(mut self, granularity: ThresholdGranularity) -> Self {
        self.granularity = granularity;
        self
    }

    /// Set accumulation policy
    pub fn with_accumulation(mut self, accumulation: AccumulationPolicy) -> Self {
        self.accumulation = accumulation;
        self
    }

    /// Number of positive-frequency bins
    pub fn bins(&self) -> usize {
        self.snapshot_len / 2
    }

    /// Number of configured groups
    pub fn groups(&self) -> usize {
        self.group_upper_bins.len()
    }

    /// Snapshots making up one measurement interval (at least one)
    pub fn snapshots_per_interval(&self) -> u32 {
        if self.snapshot_len == 0 {
            return 1;
        }
        let samples = self.publish_interval_s as u64 * SAMPLE_RATE_HZ as u64;
        (samples / self.snapshot_len as u64).clamp(1, u32::MAX as u64) as u32
    }

    /// Check every invariant; returns the group layout on success
    pub fn validate(&self) -> ConfigResult<BinGroupLayout> {
        let len = self.snapshot_len;
        if !len.is_power_of_two() {
            return Err(ConfigError::SnapshotLenNotPowerOfTwo { len });
        }
        if !(MIN_SNAPSHOT_LEN..=SNAPSHOT_LEN).contains(&len) {
            return Err(ConfigError::SnapshotLenOutOfRange {
                len,
                min: MIN_SNAPSHOT_LEN,
                max: SNAPSHOT_LEN,
            });
        }

        let layout = self.layout()?;

        if self.range_correction.len() != self.bins() {
            return Err(ConfigError::TableLength {
                table: "range_correction",
                expected: self.bins(),
                actual: self.range_correction.len(),
            });
        }
        RangeCorrection::from_factors(self.range_correction.clone())?;

        if self.amount_factors.len() != layout.len() {
            return Err(ConfigError::TableLength {
                table: "amount_factors",
                expected: layout.len(),
                actual: self.amount_factors.len(),
            });
        }
        if let Some(index) = self
            .amount_factors
            .iter()
            .position(|f| !f.is_finite() || *f < 0.0)
        {
            return Err(ConfigError::InvalidFactor { table: "amount_factors", index });
        }

        if !(self.calibration_floor.is_finite() && self.calibration_floor > 0.0) {
            return Err(ConfigError::NotPositive { name: "calibration_floor" });
        }
        if !(self.threshold_factor.is_finite() && self.threshold_factor > 0.0) {
            return Err(ConfigError::NotPositive { name: "threshold_factor" });
        }
        if !self.threshold_offset.is_finite() {
            return Err(ConfigError::InvalidValue { key: keys::THRESHOLD_OFFSET });
        }
        if self.rain_first_group > self.rain_last_group {
            return Err(ConfigError::RainBoundsInverted {
                first: self.rain_first_group,
                last: self.rain_last_group,
            });
        }
        if self.publish_interval_s == 0 {
            return Err(ConfigError::NotPositive { name: "publish_interval_s" });
        }

        Ok(layout)
    }

    /// Build the contiguous group layout from the upper bounds
    pub fn layout(&self) -> ConfigResult<BinGroupLayout> {
        build_layout(&self.group_upper_bins, self.bins())
    }

    /// Load from persisted settings, falling back to defaults for missing
    /// keys, and validate the result
    pub fn from_store<S: KeyValueStore>(store: &S) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(raw) = store.get(keys::GROUP_BOUNDS) {
            let bounds = parse_list::<usize>(raw, keys::GROUP_BOUNDS)?;
            config = config.with_group_bounds(bounds);
        }
        if let Some(raw) = store.get(keys::AMOUNT_FACTORS) {
            config.amount_factors = parse_list::<f32>(raw, keys::AMOUNT_FACTORS)?;
        }
        config.threshold_factor = parse_or(store, keys::THRESHOLD_FACTOR, config.threshold_factor)?;
        config.threshold_offset = parse_or(store, keys::THRESHOLD_OFFSET, config.threshold_offset)?;
        config.calibration_floor = parse_or(store, keys::CALIBRATION_FLOOR, config.calibration_floor)?;
        config.rain_first_group = parse_or(store, keys::RAIN_FIRST, config.rain_first_group)?;
        config.rain_last_group = parse_or(store, keys::RAIN_LAST, config.rain_last_group)?;
        config.publish_interval_s = parse_or(store, keys::PUBLISH_INTERVAL, config.publish_interval_s)?;
        config.granularity = parse_or(store, keys::GRANULARITY, config.granularity)?;
        config.accumulation = parse_or(store, keys::ACCUMULATE, config.accumulation)?;

        match config.validate() {
            Ok(_) => {
                log_info!(
                    "Configuration accepted: {} bins in {} groups, rain groups {}..={}",
                    config.bins(),
                    config.groups(),
                    config.rain_first_group,
                    config.rain_last_group
                );
                Ok(config)
            }
            Err(e) => {
                log_warn!("Configuration rejected: {}", e);
                Err(e)
            }
        }
    }
}

/// Upper bounds splitting `bins` into `groups` near-equal contiguous groups
pub fn equal_group_bounds(bins: usize, groups: usize) -> Vec<usize> {
    if bins == 0 || groups == 0 {
        return Vec::new();
    }
    (1..=groups).map(|g| g * bins / groups - 1).collect()
}

fn build_layout(upper_bins: &[usize], bins: usize) -> ConfigResult<BinGroupLayout> {
    if upper_bins.is_empty() {
        return Err(ConfigError::NoBinGroups);
    }
    if upper_bins.len() > MAX_BIN_GROUPS {
        return Err(ConfigError::TooManyBinGroups {
            count: upper_bins.len(),
            max: MAX_BIN_GROUPS,
        });
    }

    let mut layout = BinGroupLayout::new();
    let mut first_bin = 0;
    for (group, &last_bin) in upper_bins.iter().enumerate() {
        if last_bin < first_bin || last_bin >= bins {
            return Err(ConfigError::GroupBoundsNotIncreasing { group });
        }
        // Capacity checked above
        let _ = layout.push(BinGroupRange { first_bin, last_bin });
        first_bin = last_bin + 1;
    }

    if first_bin != bins {
        return Err(ConfigError::GroupBoundsIncomplete {
            last: first_bin - 1,
            expected: bins.saturating_sub(1),
        });
    }

    Ok(layout)
}

fn parse_or<S, T>(store: &S, key: &'static str, default: T) -> ConfigResult<T>
where
    S: KeyValueStore,
    T: FromStr,
{
    match store.get(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue { key }),
        None => Ok(default),
    }
}

fn parse_list<T: FromStr>(raw: &str, key: &'static str) -> ConfigResult<Vec<T>> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|item| !item.is_empty())
        .map(|item| item.parse().map_err(|_| ConfigError::InvalidValue { key }))
        .collect()
}

/// Persisted settings in the firmware's `SETUP key value; ...` format
///
/// Entries keep their insertion order; adding an existing key moves it to
/// the end with the new value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsText {
    entries: Vec<(String, String)>,
}

impl SettingsText {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `SETUP key value; key value;`
    ///
    /// The `SETUP ` prefix and the final `;` are optional. Keys end at the
    /// first space; entries without a value are skipped.
    pub fn parse(text: &str) -> Self {
        let mut settings = Self::new();
        let text = text.trim();
        let text = text.strip_prefix("SETUP ").unwrap_or(text);

        for entry in text.split(';') {
            let Some((key, value)) = entry.trim_start().split_once(' ') else {
                continue;
            };
            let (key, value) = (key.trim(), value.trim());
            if !key.is_empty() && !value.is_empty() {
                settings.add(key, value);
            }
        }

        settings
    }

    /// Insert or replace `key`; an empty value removes it
    pub fn add(&mut self, key: &str, value: &str) {
        self.remove(key);
        if !value.is_empty() {
            self.entries.push((key.to_owned(), value.to_owned()));
        }
    }

    /// Remove `key` if present
    pub fn remove(&mut self, key: &str) {
        self.entries.retain(|(k, _)| k != key);
    }

    /// Remove every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no entries are stored
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl KeyValueStore for SettingsText {
    fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for SettingsText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SETUP")?;
        for (key, value) in self.iter() {
            write!(f, " {} {};", key, value)?;
        }
        Ok(())
    }
}
