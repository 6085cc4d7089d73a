//! Calibration Defaults and Classification Boundaries
//!
//! These are starting values only. Every one of them can be overridden from
//! the persisted key/value settings (see [`crate::config`]).

/// Multiplier applied to a calibrated threshold before detection.
pub const DEFAULT_THRESHOLD_FACTOR: f32 = 2.0;

/// Constant added to the scaled threshold before detection.
pub const DEFAULT_THRESHOLD_OFFSET: f32 = 0.0;

/// Value substituted for a zero peak during calibration, and for a zero
/// reference peak.
pub const DEFAULT_CALIBRATION_FLOOR: f32 = 1.0;

/// First dominant group classified as rain; lower groups are snow.
pub const DEFAULT_RAIN_FIRST_GROUP: usize = 7;

/// Last dominant group classified as rain; higher groups are hail.
pub const DEFAULT_RAIN_LAST_GROUP: usize = 23;

/// Measurement interval between two publications.
pub const DEFAULT_PUBLISH_INTERVAL_S: u32 = 60;

/// Snapshots a single drop remains visible in bin 1.
///
/// Derived for a 1 m field of view and 0° sensor tilt. The dwell time is
/// inversely proportional to the Doppler frequency, so bin `k` sees the same
/// drop for `DROP_DWELL_SNAPSHOTS_BIN1 / k` snapshots.
pub const DROP_DWELL_SNAPSHOTS_BIN1: f32 = 322.6667;
