//! Collaborator Traits
//!
//! The acquisition core talks to hardware and to the rest of the firmware
//! only through these seams. Each one is small enough to mock in a host test.
//!
//! - [`AdcChannel`] - one analog input, read from interrupt context
//! - [`SampleTimer`] - the periodic interrupt that drives sampling
//! - [`Publisher`] - receives the finished [`BinModel`] once per interval
//! - [`KeyValueStore`] - persisted settings, read once at startup

use crate::model::BinModel;

/// Analog input sampled by the timer interrupt
///
/// `read_raw` runs in interrupt context at the full sample rate. It must
/// return quickly and must not block, allocate or log.
pub trait AdcChannel {
    /// Read one raw conversion (0..=`ADC_FULL_SCALE`)
    fn read_raw(&mut self) -> u16;
}

/// Periodic interrupt source that calls
/// [`SampleSource::on_tick`](crate::sampler::SampleSource::on_tick)
///
/// The period is fixed at `1 / SAMPLE_RATE_HZ`; only start and stop are
/// controllable.
pub trait SampleTimer {
    /// Start the periodic interrupt
    fn arm(&mut self);

    /// Stop the periodic interrupt; no tick may fire after this returns
    fn disarm(&mut self);
}

/// Sink for the finished measurement interval
///
/// Called on the main loop after Finalize and before Reset. The model is
/// only borrowed; anything the publisher needs later must be copied out.
///
/// Closures work directly:
///
/// ```rust
/// use precip_core::model::BinModel;
/// use precip_core::traits::Publisher;
///
/// let mut published = 0;
/// let mut sink = |_: &BinModel| published += 1;
/// # fn takes<P: Publisher>(_: &mut P) {}
/// # takes(&mut sink);
/// ```
pub trait Publisher {
    /// Publish the interval's statistics
    fn publish(&mut self, model: &BinModel);
}

impl<F> Publisher for F
where
    F: FnMut(&BinModel),
{
    fn publish(&mut self, model: &BinModel) {
        self(model)
    }
}

/// Read access to persisted key/value settings
pub trait KeyValueStore {
    /// Value stored under `key`, if any
    fn get(&self, key: &str) -> Option<&str>;

    /// True when `key` is present
    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}
