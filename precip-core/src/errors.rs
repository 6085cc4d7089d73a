//! Error Types for Configuration and Capture Failures
//!
//! ## Design Philosophy
//!
//! The acquisition core runs on a microcontroller next to a periodic sampling
//! interrupt, so its errors follow the same rules as the rest of the hot path:
//!
//! 1. **Small Size**: every variant carries a handful of integers or a
//!    `&'static str`, never an owned string.
//! 2. **Copy Semantics**: errors are `Copy` so they can be returned from the
//!    main loop and stored in diagnostics without allocation.
//! 3. **Fail Fast**: configuration problems are reported when the
//!    configuration is loaded, before capture starts. Nothing in here is ever
//!    raised from interrupt context.
//!
//! ## Error Categories
//!
//! ### Configuration (`ConfigError`)
//! - Snapshot length that is not a supported power of two
//! - Bin-group boundaries that do not cover the bin range contiguously
//! - Calibration tables whose length does not match the bin/group count
//! - Unparsable key/value settings
//!
//! ### Capture (`CaptureError`)
//! - `InsufficientData`: the ring buffer does not yet hold a full snapshot
//! - `SnapshotLength`: a magnitude vector of the wrong size reached Statistics
//!
//! Buffer overflow, ADC clipping and zero denominators are deliberately *not*
//! errors: they are counted in the [`BinModel`](crate::model::BinModel) or
//! resolve to zero.
//!
//! ```rust
//! use precip_core::config::SensorConfig;
//! use precip_core::errors::ConfigError;
//!
//! let mut config = SensorConfig::default();
//! config.snapshot_len = 1000;
//! assert!(matches!(
//!     config.validate(),
//!     Err(ConfigError::SnapshotLenNotPowerOfTwo { len: 1000 })
//! ));
//! ```

use thiserror_no_std::Error;

/// Result type for configuration loading and validation
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for main-loop capture operations
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Configuration invariant violations, reported at load time
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum ConfigError {
    /// Snapshot length is not a power of two
    #[error("Snapshot length {len} is not a power of two")]
    SnapshotLenNotPowerOfTwo {
        /// Rejected snapshot length
        len: usize,
    },

    /// Snapshot length outside the supported range
    #[error("Snapshot length {len} outside [{min}, {max}]")]
    SnapshotLenOutOfRange {
        /// Rejected snapshot length
        len: usize,
        /// Smallest supported length
        min: usize,
        /// Largest supported length
        max: usize,
    },

    /// No bin groups configured
    #[error("At least one bin group is required")]
    NoBinGroups,

    /// More bin groups than the model can hold
    #[error("{count} bin groups exceed the limit of {max}")]
    TooManyBinGroups {
        /// Configured group count
        count: usize,
        /// Maximum supported group count
        max: usize,
    },

    /// A group's upper bound does not lie above the previous group's
    #[error("Bin group {group} does not start after the previous group")]
    GroupBoundsNotIncreasing {
        /// Index of the offending group
        group: usize,
    },

    /// The last group does not end on the last bin
    #[error("Bin groups end at bin {last}, expected {expected}")]
    GroupBoundsIncomplete {
        /// Upper bound of the last group
        last: usize,
        /// Index of the last bin
        expected: usize,
    },

    /// Calibration table has the wrong number of entries
    #[error("Table {table} has {actual} entries, expected {expected}")]
    TableLength {
        /// Name of the table
        table: &'static str,
        /// Required length
        expected: usize,
        /// Supplied length
        actual: usize,
    },

    /// Calibration table entry is not usable (non-finite, or not positive
    /// where a divisor is required)
    #[error("Table {table} has an invalid entry at index {index}")]
    InvalidFactor {
        /// Name of the table
        table: &'static str,
        /// Index of the offending entry
        index: usize,
    },

    /// Rain boundaries are in the wrong order
    #[error("Rain boundaries inverted: first {first} > last {last}")]
    RainBoundsInverted {
        /// First dominant group classified as rain
        first: usize,
        /// Last dominant group classified as rain
        last: usize,
    },

    /// A scalar parameter must be strictly positive and finite
    #[error("Parameter {name} must be positive")]
    NotPositive {
        /// Parameter name
        name: &'static str,
    },

    /// A key/value setting could not be parsed
    #[error("Setting {key} has an unparsable value")]
    InvalidValue {
        /// Settings key
        key: &'static str,
    },
}

/// Main-loop capture failures
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum CaptureError {
    /// Not enough unread samples for a snapshot
    #[error("Insufficient data: need {required}, have {available}")]
    InsufficientData {
        /// Samples needed for one snapshot
        required: usize,
        /// Unread samples currently buffered
        available: usize,
    },

    /// Magnitude vector does not match the configured bin count
    #[error("Snapshot has {actual} bins, expected {expected}")]
    SnapshotLength {
        /// Configured bin count
        expected: usize,
        /// Length of the supplied vector
        actual: usize,
    },

    /// The spectral transform rejected its buffers
    #[error("Spectral transform failed")]
    Transform,
}

#[cfg(feature = "defmt")]
impl defmt::Format for ConfigError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::SnapshotLenNotPowerOfTwo { len } =>
                defmt::write!(fmt, "Snapshot length {} not a power of two", len),
            Self::SnapshotLenOutOfRange { len, min, max } =>
                defmt::write!(fmt, "Snapshot length {} outside [{}, {}]", len, min, max),
            Self::NoBinGroups =>
                defmt::write!(fmt, "No bin groups"),
            Self::TooManyBinGroups { count, max } =>
                defmt::write!(fmt, "{} bin groups exceed {}", count, max),
            Self::GroupBoundsNotIncreasing { group } =>
                defmt::write!(fmt, "Bin group {} not increasing", group),
            Self::GroupBoundsIncomplete { last, expected } =>
                defmt::write!(fmt, "Bin groups end at {}, expected {}", last, expected),
            Self::TableLength { table, expected, actual } =>
                defmt::write!(fmt, "Table {}: {} entries, expected {}", table, actual, expected),
            Self::InvalidFactor { table, index } =>
                defmt::write!(fmt, "Table {}: invalid entry {}", table, index),
            Self::RainBoundsInverted { first, last } =>
                defmt::write!(fmt, "Rain bounds inverted: {} > {}", first, last),
            Self::NotPositive { name } =>
                defmt::write!(fmt, "Parameter {} must be positive", name),
            Self::InvalidValue { key } =>
                defmt::write!(fmt, "Setting {} unparsable", key),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for CaptureError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::InsufficientData { required, available } =>
                defmt::write!(fmt, "Need {} samples, have {}", required, available),
            Self::SnapshotLength { expected, actual } =>
                defmt::write!(fmt, "Snapshot has {} bins, expected {}", actual, expected),
            Self::Transform =>
                defmt::write!(fmt, "Spectral transform failed"),
        }
    }
}
