//! Interrupt-Side Sampling
//!
//! [`SampleSource::on_tick`] is the whole body of the periodic timer
//! interrupt: one conversion, two counter updates, one ring push. It does
//! not allocate, format, log or lock, and its cost does not depend on the
//! ring fill level.
//!
//! The 12-bit converter delivers codes in `0..=4095`. Samples are centred on
//! [`ADC_MIDPOINT`] so silence maps to zero and the spectrum's DC bin only
//! carries the front end's residual offset.

use crate::constants::{ADC_FULL_SCALE, ADC_MIDPOINT};
use crate::ring::SampleRing;
use crate::traits::AdcChannel;

/// Signed sample for a raw conversion
#[inline]
pub fn centre(raw: u16) -> i16 {
    raw.min(ADC_FULL_SCALE) as i16 - ADC_MIDPOINT as i16
}

/// True when the conversion sits on either converter rail
#[inline]
pub fn is_clipping(raw: u16) -> bool {
    raw == 0 || raw >= ADC_FULL_SCALE
}

/// Producer half of the acquisition path
///
/// ```rust
/// use precip_core::ring::SampleRing;
/// use precip_core::sampler::SampleSource;
/// use precip_core::traits::AdcChannel;
///
/// struct Rail;
/// impl AdcChannel for Rail {
///     fn read_raw(&mut self) -> u16 { 4095 }
/// }
///
/// let ring = SampleRing::<16>::new();
/// let mut source = SampleSource::new(Rail, &ring);
/// source.on_tick();
///
/// let stats = ring.stats().take();
/// assert_eq!(stats.clipped, 1);
/// assert_eq!(stats.peak, 2047);
/// ```
pub struct SampleSource<'r, A: AdcChannel, const N: usize> {
    adc: A,
    ring: &'r SampleRing<N>,
}

impl<'r, A: AdcChannel, const N: usize> SampleSource<'r, A, N> {
    /// Bind a converter channel to the ring it feeds
    pub fn new(adc: A, ring: &'r SampleRing<N>) -> Self {
        Self { adc, ring }
    }

    /// Timer interrupt body
    #[inline]
    pub fn on_tick(&mut self) {
        let raw = self.adc.read_raw();
        let sample = centre(raw);
        self.ring.stats().record(sample.unsigned_abs(), is_clipping(raw));
        self.ring.push(sample);
    }

    /// Mutable access to the converter channel
    pub fn adc_mut(&mut self) -> &mut A {
        &mut self.adc
    }

    /// Release the converter channel
    pub fn into_inner(self) -> A {
        self.adc
    }
}
