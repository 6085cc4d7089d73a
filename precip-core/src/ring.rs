//! Lock-Free Sample Ring Between the Sampling Interrupt and the Main Loop
//!
//! ## Overview
//!
//! The sampling interrupt produces one signed sample per tick; the main loop
//! consumes them a whole snapshot at a time. [`SampleRing`] is the only state
//! shared between the two contexts.
//!
//! ```text
//! Timer ISR (producer)                 Main loop (consumer)
//!      ↓                                     ↓
//!   push(sample) ──→ [AtomicI16; N] ──→ pop_snapshot(&mut [i16])
//!      ↓                                     ↓
//!   never blocks                        fails with InsufficientData
//! ```
//!
//! ## Algorithm
//!
//! Two free-running counters index the slot array. Only the producer
//! advances `write`, only the consumer advances `read`; the slot index is
//! the counter masked with `N - 1`.
//!
//! ```text
//! ┌─────┬─────┬─────┬─────┬─────┬─────┬─────┬─────┐
//! │  0  │  1  │  2  │  3  │  4  │  5  │  6  │  7  │
//! └─────┴─────┴─────┴─────┴─────┴─────┴─────┴─────┘
//!          ↑                       ↑
//!        read                    write
//!     (next unread)           (next slot)
//! ```
//!
//! Unlike the usual bounded queue the producer never refuses a sample. When
//! `write - read` already equals `N` the oldest unread sample is overwritten
//! and the sticky overflow flag is raised. The consumer notices the overrun
//! on its next pop and skips forward to the oldest sample still held.
//!
//! ## Memory Ordering
//!
//! - **Release** on `write` after the slot store, **Acquire** when the
//!   consumer loads it: a slot is never read before its sample is visible.
//! - **Release** on `read` after the consumer copied a snapshot, **Acquire**
//!   in the producer's overflow check.
//! - **Relaxed** for slots and statistics, which are ordered by the counters.
//!
//! Slots are atomics, so the ring needs no `unsafe` and can live in a
//! `static` next to the interrupt handler.

use core::sync::atomic::{AtomicBool, AtomicI16, AtomicU16, AtomicU32, AtomicUsize, Ordering};

use crate::constants::RING_CAPACITY;
use crate::errors::{CaptureError, CaptureResult};

/// Ring sized for the production snapshot length
pub type DefaultSampleRing = SampleRing<RING_CAPACITY>;

/// Single-producer/single-consumer ring of signed samples
///
/// ```rust
/// use precip_core::ring::SampleRing;
///
/// static RING: SampleRing<8> = SampleRing::new();
///
/// // Interrupt context
/// for sample in [1, 2, 3, 4] {
///     RING.push(sample);
/// }
///
/// // Main loop
/// let mut snapshot = [0i16; 4];
/// RING.pop_snapshot(&mut snapshot).unwrap();
/// assert_eq!(snapshot, [1, 2, 3, 4]);
/// ```
pub struct SampleRing<const N: usize> {
    slots: [AtomicI16; N],
    /// Samples ever pushed (producer owned)
    write: AtomicUsize,
    /// Samples ever consumed or skipped (consumer owned)
    read: AtomicUsize,
    /// Set by the producer on overwrite, cleared by the consumer
    overflow: AtomicBool,
    stats: AcquisitionStats,
}

/// Counters maintained by the sampling interrupt
///
/// Lives next to the ring indices and is drained by the main loop once per
/// handle pass.
#[derive(Debug)]
pub struct AcquisitionStats {
    /// Samples pushed since the last take
    pub pushed: AtomicU32,
    /// Largest |sample| since the last take
    pub peak: AtomicU16,
    /// Conversions at a converter rail since the last take
    pub clipped: AtomicU32,
}

/// Values taken out of [`AcquisitionStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcquisitionSnapshot {
    /// Samples pushed
    pub pushed: u32,
    /// Largest |sample|
    pub peak: u16,
    /// Clipping events
    pub clipped: u32,
}

impl AcquisitionStats {
    const fn new() -> Self {
        Self {
            pushed: AtomicU32::new(0),
            peak: AtomicU16::new(0),
            clipped: AtomicU32::new(0),
        }
    }

    /// Record one conversion (interrupt context)
    #[inline]
    pub fn record(&self, magnitude: u16, clipped: bool) {
        self.peak.fetch_max(magnitude, Ordering::Relaxed);
        if clipped {
            self.clipped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Read and zero every counter (main loop)
    pub fn take(&self) -> AcquisitionSnapshot {
        AcquisitionSnapshot {
            pushed: self.pushed.swap(0, Ordering::Relaxed),
            peak: self.peak.swap(0, Ordering::Relaxed),
            clipped: self.clipped.swap(0, Ordering::Relaxed),
        }
    }
}

impl<const N: usize> SampleRing<N> {
    const CAPACITY_OK: () = assert!(
        N.is_power_of_two(),
        "Ring capacity must be power of 2"
    );

    /// Create an empty ring; usable in `static` context
    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::CAPACITY_OK;
        Self {
            slots: [const { AtomicI16::new(0) }; N],
            write: AtomicUsize::new(0),
            read: AtomicUsize::new(0),
            overflow: AtomicBool::new(false),
            stats: AcquisitionStats::new(),
        }
    }

    /// Push one sample (single producer, interrupt context)
    ///
    /// Never blocks. When the ring is full the oldest unread sample is
    /// overwritten and the overflow flag is set.
    #[inline]
    pub fn push(&self, sample: i16) {
        let write = self.write.load(Ordering::Relaxed);
        let read = self.read.load(Ordering::Acquire);

        if write.wrapping_sub(read) >= N {
            self.overflow.store(true, Ordering::Release);
        }

        self.slots[write & (N - 1)].store(sample, Ordering::Relaxed);
        self.write.store(write.wrapping_add(1), Ordering::Release);
        self.stats.pushed.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the next `out.len()` unread samples into `out` (single consumer)
    ///
    /// Fails without consuming anything when fewer samples are buffered.
    /// After an overrun the oldest still-held sample is returned first.
    pub fn pop_snapshot(&self, out: &mut [i16]) -> CaptureResult<()> {
        let write = self.write.load(Ordering::Acquire);
        let mut read = self.read.load(Ordering::Relaxed);

        let mut available = write.wrapping_sub(read);
        if available > N {
            read = write.wrapping_sub(N);
            available = N;
        }

        if available < out.len() {
            return Err(CaptureError::InsufficientData {
                required: out.len(),
                available,
            });
        }

        for (offset, slot) in out.iter_mut().enumerate() {
            *slot = self.slots[read.wrapping_add(offset) & (N - 1)].load(Ordering::Relaxed);
        }

        self.read.store(read.wrapping_add(out.len()), Ordering::Release);
        Ok(())
    }

    /// Drop every unread sample (consumer side)
    pub fn discard(&self) {
        let write = self.write.load(Ordering::Acquire);
        self.read.store(write, Ordering::Release);
    }

    /// Unread samples, capped at the capacity
    pub fn len(&self) -> usize {
        let write = self.write.load(Ordering::Acquire);
        let read = self.read.load(Ordering::Acquire);
        write.wrapping_sub(read).min(N)
    }

    /// True when nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Slot count
    pub const fn capacity(&self) -> usize {
        N
    }

    /// True when unread data was overwritten since the flag was last cleared
    pub fn overflowed(&self) -> bool {
        self.overflow.load(Ordering::Acquire)
    }

    /// Clear the overflow flag
    pub fn clear_overflow(&self) {
        self.overflow.store(false, Ordering::Release);
    }

    /// Read and clear the overflow flag in one step
    pub fn take_overflow(&self) -> bool {
        self.overflow.swap(false, Ordering::AcqRel)
    }

    /// Interrupt-side counters
    pub fn stats(&self) -> &AcquisitionStats {
        &self.stats
    }
}

impl<const N: usize> Default for SampleRing<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_without_overflow() {
        let ring = SampleRing::<8>::new();
        for sample in 0..6 {
            ring.push(sample);
        }
        assert_eq!(ring.len(), 6);

        let mut out = [0i16; 6];
        ring.pop_snapshot(&mut out).unwrap();
        assert_eq!(out, [0, 1, 2, 3, 4, 5]);
        assert!(ring.is_empty());
        assert!(!ring.overflowed());
    }

    #[test]
    fn insufficient_data_consumes_nothing() {
        let ring = SampleRing::<8>::new();
        ring.push(7);
        ring.push(9);

        let mut out = [0i16; 4];
        assert_eq!(
            ring.pop_snapshot(&mut out),
            Err(CaptureError::InsufficientData { required: 4, available: 2 })
        );
        assert_eq!(ring.len(), 2);

        let mut out = [0i16; 2];
        ring.pop_snapshot(&mut out).unwrap();
        assert_eq!(out, [7, 9]);
    }

    #[test]
    fn full_ring_does_not_overflow() {
        let ring = SampleRing::<4>::new();
        for sample in 0..4 {
            ring.push(sample);
        }
        assert!(!ring.overflowed());
        assert_eq!(ring.len(), ring.capacity());
    }

    #[test]
    fn overrun_sets_sticky_flag_and_skips_forward() {
        let ring = SampleRing::<4>::new();
        for sample in 0..6 {
            ring.push(sample);
        }
        assert!(ring.overflowed());
        assert_eq!(ring.len(), 4);

        let mut out = [0i16; 4];
        ring.pop_snapshot(&mut out).unwrap();
        assert_eq!(out, [2, 3, 4, 5]);

        // Still set until the consumer clears it
        assert!(ring.overflowed());
        assert!(ring.take_overflow());
        assert!(!ring.take_overflow());
    }

    #[test]
    fn discard_drops_unread() {
        let ring = SampleRing::<8>::new();
        for sample in 0..5 {
            ring.push(sample);
        }
        ring.discard();
        assert!(ring.is_empty());

        ring.push(42);
        let mut out = [0i16; 1];
        ring.pop_snapshot(&mut out).unwrap();
        assert_eq!(out, [42]);
    }

    #[test]
    fn stats_track_peak_and_clipping() {
        let ring = SampleRing::<8>::new();
        ring.stats().record(100, false);
        ring.stats().record(2048, true);
        ring.stats().record(5, false);
        ring.push(1);

        let taken = ring.stats().take();
        assert_eq!(taken, AcquisitionSnapshot { pushed: 1, peak: 2048, clipped: 1 });
        assert_eq!(ring.stats().take(), AcquisitionSnapshot::default());
    }

    #[test]
    fn counters_wrap_cleanly() {
        let ring = SampleRing::<4>::new();
        let mut out = [0i16; 2];
        for round in 0..100i16 {
            ring.push(round);
            ring.push(-round);
            ring.pop_snapshot(&mut out).unwrap();
            assert_eq!(out, [round, -round]);
        }
        assert!(!ring.overflowed());
    }
}
