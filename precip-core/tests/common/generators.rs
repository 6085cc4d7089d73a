//! Signal and spectrum generators
//!
//! Raw ADC sequences for driving the sampling path, and synthetic magnitude
//! snapshots for driving Statistics directly.

use core::f32::consts::PI;

use precip_core::constants::{ADC_FULL_SCALE, ADC_MIDPOINT};

/// Raw codes of a sine that completes `bin` cycles every `snapshot_len`
/// samples, so all its energy sits in FFT bin `bin`
pub fn tone(bin: usize, amplitude: f32, snapshot_len: usize, samples: usize) -> Vec<u16> {
    (0..samples)
        .map(|n| {
            let phase = 2.0 * PI * bin as f32 * n as f32 / snapshot_len as f32;
            to_code(amplitude * phase.sin())
        })
        .collect()
}

/// Raw codes at mid-scale
pub fn silence(samples: usize) -> Vec<u16> {
    vec![ADC_MIDPOINT; samples]
}

/// Magnitude snapshot with the given `(bin, magnitude)` pairs, zero elsewhere
pub fn snapshot_with(bins: usize, lines: &[(usize, f32)]) -> Vec<f32> {
    let mut snapshot = vec![0.0; bins];
    for &(bin, magnitude) in lines {
        snapshot[bin] = magnitude;
    }
    snapshot
}

fn to_code(centred: f32) -> u16 {
    (ADC_MIDPOINT as f32 + centred).round().clamp(0.0, ADC_FULL_SCALE as f32) as u16
}

/// Deterministic noise source
pub struct NoiseGenerator {
    seed: u32,
}

impl NoiseGenerator {
    pub fn new(seed: u32) -> Self {
        Self { seed }
    }

    /// Uniform in [0, 1]
    pub fn random_float(&mut self) -> f32 {
        self.seed = self.seed.wrapping_mul(1664525).wrapping_add(1013904223);
        (self.seed as f32) / (u32::MAX as f32)
    }

    /// Raw codes of uniform noise of ±`amplitude` around mid-scale
    pub fn codes(&mut self, amplitude: f32, samples: usize) -> Vec<u16> {
        (0..samples)
            .map(|_| to_code((self.random_float() * 2.0 - 1.0) * amplitude))
            .collect()
    }

    /// Magnitude snapshot with every bin uniform in [0, `level`]
    pub fn snapshot(&mut self, bins: usize, level: f32) -> Vec<f32> {
        (0..bins).map(|_| self.random_float() * level).collect()
    }
}
