//! Constants for the Precipitation Sensor Core
//!
//! Centralised numeric values for the acquisition pipeline. Values that the
//! whole spectral pipeline depends on (sample rate, snapshot length) are
//! build-time constants and must not be changed at runtime: the mapping from
//! FFT bin to frequency, and with it every calibration table, is derived
//! from them.
//!
//! ## Organization
//!
//! - **Sampling**: ADC rate, snapshot geometry, ring buffer sizing
//! - **Calibration**: defaults for thresholds, classification and tables

/// Sampling rate, snapshot geometry and ADC characteristics.
pub mod sampling;

/// Calibration defaults and classification boundaries.
pub mod calibration;

pub use sampling::{
    SAMPLE_RATE_HZ, SNAPSHOT_LEN_BITS, SNAPSHOT_LEN, NR_OF_BINS, RING_CAPACITY,
    MIN_SNAPSHOT_LEN, MAX_BIN_GROUPS, ADC_FULL_SCALE, ADC_MIDPOINT,
};

pub use calibration::{
    DEFAULT_THRESHOLD_FACTOR, DEFAULT_THRESHOLD_OFFSET, DEFAULT_CALIBRATION_FLOOR,
    DEFAULT_RAIN_FIRST_GROUP, DEFAULT_RAIN_LAST_GROUP, DEFAULT_PUBLISH_INTERVAL_S,
    DROP_DWELL_SNAPSHOTS_BIN1,
};
