//! Snapshot Spectral Analysis and Capture Control
//!
//! ## Overview
//!
//! [`SpectralAnalyzer`] is the consumer half of the acquisition path. It
//! owns the sampling timer and with it the capture state machine:
//!
//! ```text
//!            start_capture()
//!   Idle ───────────────────→ Capturing
//!    ↑                            │
//!    └────────────────────────────┘
//!            stop_capture()
//! ```
//!
//! While capturing, every main-loop call to [`handle`](SpectralAnalyzer::handle)
//! drains all complete snapshots from the ring:
//!
//! ```text
//! pop_snapshot ─→ × Hann ─→ real FFT ─→ |X[k]| / n ─→ Statistics::calc
//!  n samples      window     n/2+1 bins   k < n/2
//! ```
//!
//! Bin `k` lies at `k × SAMPLE_RATE_HZ / n` Hz. The Nyquist bin is dropped
//! so the model holds exactly `n / 2` bins, bin 0 being the DC term.
//!
//! ## Buffers
//!
//! The window, the transform plan and every scratch buffer are allocated in
//! [`SpectralAnalyzer::new`]. A snapshot only touches preallocated memory.
//!
//! ## Overflow and Clipping
//!
//! Each handle pass folds the interrupt-side counters into the model before
//! processing: a raised overflow flag increments `overflow_ctr` and is
//! cleared, pushed samples, clipping events and the peak sample are added.
//! Neither stops capture.

use std::sync::Arc;

use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};

use crate::constants::MIN_SNAPSHOT_LEN;
use crate::errors::{CaptureError, CaptureResult, ConfigError, ConfigResult};
use crate::model::BinModel;
use crate::ring::SampleRing;
use crate::statistics::Statistics;
use crate::traits::SampleTimer;

/// Capture state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureState {
    /// Timer stopped, ring ignored
    #[default]
    Idle,
    /// Timer running, snapshots processed on every handle call
    Capturing,
}

/// Symmetric Hann window
#[derive(Debug, Clone, PartialEq)]
pub struct HannWindow {
    coefficients: Vec<f32>,
}

impl HannWindow {
    /// Window of `len` coefficients, zero at both ends
    pub fn new(len: usize) -> Self {
        let span = len.saturating_sub(1).max(1) as f32;
        let coefficients = (0..len)
            .map(|i| 0.5 * (1.0 - libm::cosf(2.0 * core::f32::consts::PI * i as f32 / span)))
            .collect();
        Self { coefficients }
    }

    /// Window length
    pub fn len(&self) -> usize {
        self.coefficients.len()
    }

    /// True for a zero-length window
    pub fn is_empty(&self) -> bool {
        self.coefficients.is_empty()
    }

    /// Coefficients
    pub fn coefficients(&self) -> &[f32] {
        &self.coefficients
    }

    /// Write `samples × window` into `out`
    pub fn apply(&self, samples: &[i16], out: &mut [f32]) {
        for ((o, &s), &w) in out.iter_mut().zip(samples).zip(&self.coefficients) {
            *o = s as f32 * w;
        }
    }
}

/// Main-loop consumer of the sample ring
pub struct SpectralAnalyzer<'r, T: SampleTimer, const N: usize> {
    ring: &'r SampleRing<N>,
    timer: T,
    state: CaptureState,
    snapshot_len: usize,
    window: HannWindow,
    fft: Arc<dyn RealToComplex<f32>>,
    samples: Vec<i16>,
    input: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    magnitudes: Vec<f32>,
}

impl<'r, T: SampleTimer, const N: usize> SpectralAnalyzer<'r, T, N> {
    /// Plan the transform for `snapshot_len` samples
    ///
    /// The ring must hold at least two snapshots.
    pub fn new(ring: &'r SampleRing<N>, timer: T, snapshot_len: usize) -> ConfigResult<Self> {
        if !snapshot_len.is_power_of_two() {
            return Err(ConfigError::SnapshotLenNotPowerOfTwo { len: snapshot_len });
        }
        let max = N / 2;
        if snapshot_len < MIN_SNAPSHOT_LEN || snapshot_len > max {
            return Err(ConfigError::SnapshotLenOutOfRange {
                len: snapshot_len,
                min: MIN_SNAPSHOT_LEN,
                max,
            });
        }

        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(snapshot_len);

        Ok(Self {
            ring,
            timer,
            state: CaptureState::Idle,
            snapshot_len,
            window: HannWindow::new(snapshot_len),
            samples: vec![0; snapshot_len],
            input: fft.make_input_vec(),
            spectrum: fft.make_output_vec(),
            scratch: fft.make_scratch_vec(),
            magnitudes: vec![0.0; snapshot_len / 2],
            fft,
        })
    }

    /// Samples per snapshot
    pub fn snapshot_len(&self) -> usize {
        self.snapshot_len
    }

    /// Current capture state
    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// True while the timer is armed
    pub fn is_capturing(&self) -> bool {
        self.state == CaptureState::Capturing
    }

    /// True when the ring holds at least one complete snapshot
    pub fn snapshot_ready(&self) -> bool {
        self.ring.len() >= self.snapshot_len
    }

    /// Magnitudes of the most recent snapshot
    pub fn magnitudes(&self) -> &[f32] {
        &self.magnitudes
    }

    /// Timer access
    pub fn timer(&self) -> &T {
        &self.timer
    }

    /// Arm the timer and start consuming (Idle → Capturing)
    ///
    /// Samples, the overflow flag and counters left over from before the
    /// timer was armed are dropped. No-op while already capturing.
    pub fn start_capture(&mut self) {
        if self.is_capturing() {
            return;
        }
        self.ring.discard();
        self.ring.clear_overflow();
        self.ring.stats().take();

        self.timer.arm();
        self.state = CaptureState::Capturing;
        log_info!("Capture started: {} samples per snapshot", self.snapshot_len);
    }

    /// Disarm the timer (Capturing → Idle)
    ///
    /// Unread samples are discarded, so a partial snapshot is never
    /// resumed. The overflow flag and counters are left for
    /// [`fold_acquisition`](Self::fold_acquisition). Safe to call in either
    /// state.
    pub fn stop_capture(&mut self) {
        if !self.is_capturing() {
            return;
        }
        self.timer.disarm();
        self.ring.discard();
        self.state = CaptureState::Idle;
        log_info!("Capture stopped");
    }

    /// Process every complete snapshot in the ring
    ///
    /// Returns the number of snapshots handed to [`Statistics::calc`].
    pub fn handle(&mut self, model: &mut BinModel, statistics: &Statistics) -> CaptureResult<usize> {
        self.handle_bounded(model, statistics, usize::MAX)
    }

    /// Like [`handle`](Self::handle), but stops after `limit` snapshots
    pub fn handle_bounded(
        &mut self,
        model: &mut BinModel,
        statistics: &Statistics,
        limit: usize,
    ) -> CaptureResult<usize> {
        if !self.is_capturing() {
            return Ok(0);
        }

        self.fold_acquisition(model);

        let mut processed = 0;
        while processed < limit && self.snapshot_ready() {
            self.process_snapshot(model, statistics)?;
            processed += 1;
        }
        Ok(processed)
    }

    /// Move the interrupt-side overflow flag and counters into `model`
    ///
    /// Called at the start of every handle pass. Call it after
    /// [`stop_capture`](Self::stop_capture) as well, otherwise events since
    /// the last pass are dropped by the next [`start_capture`](Self::start_capture).
    pub fn fold_acquisition(&mut self, model: &mut BinModel) {
        if self.ring.take_overflow() {
            model.overflow_ctr = model.overflow_ctr.saturating_add(1);
            log_warn!("Sample ring overrun, {} this interval", model.overflow_ctr);
        }

        let stats = self.ring.stats().take();
        model.sample_ctr = model.sample_ctr.saturating_add(stats.pushed);
        model.clipping_ctr = model.clipping_ctr.saturating_add(stats.clipped);
        model.adc_peak_sample = model.adc_peak_sample.max(stats.peak);
    }

    /// Pop, window and transform one snapshot, then feed Statistics
    pub fn process_snapshot(
        &mut self,
        model: &mut BinModel,
        statistics: &Statistics,
    ) -> CaptureResult<()> {
        self.ring.pop_snapshot(&mut self.samples)?;

        let sum: i32 = self.samples.iter().map(|&s| s as i32).sum();
        model.adc_offset = sum as f32 / self.snapshot_len as f32;

        self.window.apply(&self.samples, &mut self.input);
        self.fft
            .process_with_scratch(&mut self.input, &mut self.spectrum, &mut self.scratch)
            .map_err(|_| CaptureError::Transform)?;

        let scale = 1.0 / self.snapshot_len as f32;
        for (magnitude, coefficient) in self.magnitudes.iter_mut().zip(&self.spectrum) {
            *magnitude = coefficient.norm() * scale;
        }

        statistics.calc(model, &self.magnitudes)
    }
}

impl<'r, T: SampleTimer, const N: usize> Drop for SpectralAnalyzer<'r, T, N> {
    fn drop(&mut self) {
        self.stop_capture();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SensorConfig;

    #[derive(Default)]
    struct CountingTimer {
        armed: bool,
        arms: u32,
        disarms: u32,
    }

    impl SampleTimer for &mut CountingTimer {
        fn arm(&mut self) {
            self.armed = true;
            self.arms += 1;
        }

        fn disarm(&mut self) {
            self.armed = false;
            self.disarms += 1;
        }
    }

    fn small() -> (SensorConfig, Statistics, BinModel) {
        let config = SensorConfig::for_snapshot_len(8)
            .with_group_bounds(vec![1, 3])
            .with_range_correction(vec![1.0; 4]);
        let statistics = Statistics::new(&config).unwrap();
        let model = BinModel::new(&config).unwrap();
        (config, statistics, model)
    }

    #[test]
    fn hann_window_shape() {
        let window = HannWindow::new(9);
        let c = window.coefficients();
        assert_eq!(c[0], 0.0);
        assert!((c[4] - 1.0).abs() < 1e-6);
        assert!(c[8].abs() < 1e-6);
        assert!((c[2] - c[6]).abs() < 1e-6);
    }

    #[test]
    fn rejects_oversized_snapshot() {
        let ring = SampleRing::<16>::new();
        let mut timer = CountingTimer::default();
        assert!(matches!(
            SpectralAnalyzer::new(&ring, &mut timer, 16),
            Err(ConfigError::SnapshotLenOutOfRange { max: 8, .. })
        ));
        assert!(matches!(
            SpectralAnalyzer::new(&ring, &mut timer, 6),
            Err(ConfigError::SnapshotLenNotPowerOfTwo { len: 6 })
        ));
    }

    #[test]
    fn state_machine_drives_timer() {
        let ring = SampleRing::<16>::new();
        let mut timer = CountingTimer::default();
        {
            let mut analyzer = SpectralAnalyzer::new(&ring, &mut timer, 8).unwrap();
            assert_eq!(analyzer.state(), CaptureState::Idle);
            analyzer.stop_capture();

            analyzer.start_capture();
            analyzer.start_capture();
            assert!(analyzer.is_capturing());

            analyzer.stop_capture();
            assert!(!analyzer.is_capturing());
        }
        assert_eq!((timer.arms, timer.disarms), (1, 1));
        assert!(!timer.armed);
    }

    #[test]
    fn idle_analyzer_ignores_ring() {
        let (_, statistics, mut model) = small();
        let ring = SampleRing::<16>::new();
        let mut timer = CountingTimer::default();
        let mut analyzer = SpectralAnalyzer::new(&ring, &mut timer, 8).unwrap();

        for _ in 0..8 {
            ring.push(100);
        }
        assert_eq!(analyzer.handle(&mut model, &statistics), Ok(0));
        assert_eq!(model.snapshot_ctr(), 0);
    }

    #[test]
    fn constant_input_lands_in_dc() {
        let (_, statistics, mut model) = small();
        let ring = SampleRing::<16>::new();
        let mut timer = CountingTimer::default();
        let mut analyzer = SpectralAnalyzer::new(&ring, &mut timer, 8).unwrap();
        analyzer.start_capture();

        for _ in 0..8 {
            ring.push(100);
        }
        assert_eq!(analyzer.handle(&mut model, &statistics), Ok(1));

        let m = analyzer.magnitudes();
        assert_eq!(m.len(), 4);
        // Σ window(8) = 3.5, scaled by 1/8
        assert!((m[0] - 100.0 * 3.5 / 8.0).abs() < 1e-3);
        assert!(m[0] > m[2] && m[0] > m[3]);
        assert_eq!(model.adc_offset(), 100.0);
        assert_eq!(model.snapshot_ctr(), 1);
    }

    #[test]
    fn tone_peaks_in_its_bin() {
        let (_, statistics, mut model) = small();
        let ring = SampleRing::<16>::new();
        let mut timer = CountingTimer::default();
        let mut analyzer = SpectralAnalyzer::new(&ring, &mut timer, 8).unwrap();
        analyzer.start_capture();

        // Two cycles per snapshot: bin 2
        for sample in [0i16, 1000, 0, -1000, 0, 1000, 0, -1000] {
            ring.push(sample);
        }
        analyzer.handle(&mut model, &statistics).unwrap();

        let m = analyzer.magnitudes();
        let loudest = (0..m.len()).max_by(|&a, &b| m[a].total_cmp(&m[b])).unwrap();
        assert_eq!(loudest, 2);
    }

    #[test]
    fn overflow_and_clipping_fold_into_model() {
        let (_, statistics, mut model) = small();
        let ring = SampleRing::<16>::new();
        let mut timer = CountingTimer::default();
        let mut analyzer = SpectralAnalyzer::new(&ring, &mut timer, 8).unwrap();
        analyzer.start_capture();

        for _ in 0..20 {
            ring.push(1);
        }
        ring.stats().record(2048, true);

        assert_eq!(analyzer.handle(&mut model, &statistics), Ok(2));
        assert_eq!(model.overflow_ctr(), 1);
        assert_eq!(model.clipping_ctr(), 1);
        assert_eq!(model.adc_peak_sample(), 2048);
        assert!(!ring.overflowed());
        // Capture continues after an overrun
        assert!(analyzer.is_capturing());
    }

    #[test]
    fn bounded_handle_leaves_rest_buffered() {
        let (_, statistics, mut model) = small();
        let ring = SampleRing::<16>::new();
        let mut timer = CountingTimer::default();
        let mut analyzer = SpectralAnalyzer::new(&ring, &mut timer, 8).unwrap();
        analyzer.start_capture();

        for _ in 0..16 {
            ring.push(0);
        }
        assert_eq!(analyzer.handle_bounded(&mut model, &statistics, 1), Ok(1));
        assert!(analyzer.snapshot_ready());
        assert_eq!(analyzer.handle(&mut model, &statistics), Ok(1));
    }

    #[test]
    fn stop_discards_partial_snapshot() {
        let (_, statistics, mut model) = small();
        let ring = SampleRing::<16>::new();
        let mut timer = CountingTimer::default();
        let mut analyzer = SpectralAnalyzer::new(&ring, &mut timer, 8).unwrap();
        analyzer.start_capture();

        for _ in 0..5 {
            ring.push(3);
        }
        analyzer.stop_capture();
        assert!(ring.is_empty());

        analyzer.start_capture();
        for _ in 0..3 {
            ring.push(3);
        }
        assert_eq!(analyzer.handle(&mut model, &statistics), Ok(0));
    }
}
