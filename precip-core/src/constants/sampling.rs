//! Sampling Rate, Snapshot Geometry and ADC Limits
//!
//! The sampling interrupt runs at [`SAMPLE_RATE_HZ`]; the main loop turns
//! every [`SNAPSHOT_LEN`] consecutive samples into one magnitude spectrum of
//! [`NR_OF_BINS`] bins. At 40.96 kHz and 1024 samples a snapshot covers
//! exactly 25 ms and each bin is 40 Hz wide.

// ===== SAMPLING =====

/// ADC sampling rate driven by the periodic timer interrupt.
///
/// Do not modify: the range-correction table assumes 40 Hz bins.
pub const SAMPLE_RATE_HZ: u32 = 40_960;

/// log2 of the snapshot length.
pub const SNAPSHOT_LEN_BITS: u32 = 10;

/// Samples per snapshot (FFT length).
pub const SNAPSHOT_LEN: usize = 1 << SNAPSHOT_LEN_BITS;

/// Positive-frequency bins per snapshot; bin 0 is the DC term.
pub const NR_OF_BINS: usize = SNAPSHOT_LEN >> 1;

/// Smallest snapshot length accepted by configuration (used by tests and
/// bench setups with short transforms).
pub const MIN_SNAPSHOT_LEN: usize = 8;

// ===== BUFFERS =====

/// Ring buffer capacity in samples.
///
/// Four snapshots of headroom: the main loop may fall behind by up to three
/// snapshots (e.g. while a publisher runs) before samples are lost.
pub const RING_CAPACITY: usize = SNAPSHOT_LEN << 2;

/// Upper bound on the number of configured bin groups.
pub const MAX_BIN_GROUPS: usize = 32;

const _: () = assert!(SNAPSHOT_LEN.is_power_of_two(), "Snapshot length must be power of 2");
const _: () = assert!(RING_CAPACITY.is_power_of_two(), "Ring capacity must be power of 2");
const _: () = assert!(RING_CAPACITY >= 2 * SNAPSHOT_LEN, "Ring must hold two snapshots");

// ===== ADC =====

/// Largest code of the 12-bit converter. Raw values at this code (or at 0)
/// count as clipping.
pub const ADC_FULL_SCALE: u16 = 4095;

/// Mid-scale code; raw readings are centred on it to form signed samples.
pub const ADC_MIDPOINT: u16 = 2048;

/// Duration of one snapshot in milliseconds.
pub const fn snapshot_duration_ms() -> u32 {
    (SNAPSHOT_LEN as u32 * 1000) / SAMPLE_RATE_HZ
}

/// Centre frequency of `bin` for a transform of `snapshot_len` samples.
pub fn bin_frequency_hz(bin: usize, snapshot_len: usize) -> f32 {
    if snapshot_len == 0 {
        return 0.0;
    }
    bin as f32 * SAMPLE_RATE_HZ as f32 / snapshot_len as f32
}
