//! Acquisition and classification core for a spectral precipitation sensor
//!
//! A timer interrupt samples the transducer into a lock-free ring; the main
//! loop windows and transforms fixed-size snapshots, accumulates per-bin
//! statistics over a measurement interval and classifies the interval as
//! snow, rain or hail from the dominant frequency band.
//!
//! Key constraints:
//! - Interrupt path is a handful of atomics, no locks or allocation
//! - All buffers allocated at construction
//! - Overflow, clipping and empty intervals are counted, never fatal
//!
//! Features: `serde` (default) derives the configuration and publisher
//! views, `log` (default) enables the logging shims, `defmt` adds
//! `defmt::Format` impls. The crate always links `std` for the FFT planner.
//!
//! ```no_run
//! use precip_core::{Pipeline, SampleRing, SampleSource, SensorConfig};
//! use precip_core::model::BinModel;
//! use precip_core::traits::{AdcChannel, SampleTimer};
//!
//! # struct Adc; impl AdcChannel for Adc { fn read_raw(&mut self) -> u16 { 2048 } }
//! # struct Timer; impl SampleTimer for Timer { fn arm(&mut self) {} fn disarm(&mut self) {} }
//! static RING: SampleRing<4096> = SampleRing::new();
//!
//! // Timer interrupt
//! let mut source = SampleSource::new(Adc, &RING);
//! source.on_tick();
//!
//! // Main loop
//! let mut pipeline = Pipeline::builder(&RING, Timer)
//!     .config(SensorConfig::default())
//!     .build()
//!     .unwrap();
//! pipeline.start_capture();
//! loop {
//!     pipeline.handle(&mut |model: &BinModel| {
//!         println!("{:?}: {}", model.precipitation(), model.precipitation_amount());
//!     }).unwrap();
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

#[macro_use]
mod macros;

pub mod config;
pub mod constants;
pub mod errors;
pub mod lookup;
pub mod model;
pub mod pipeline;
pub mod ring;
pub mod sampler;
pub mod spectral;
pub mod statistics;
pub mod traits;

// Public API
pub use config::{SensorConfig, SettingsText};
pub use errors::{CaptureError, CaptureResult, ConfigError, ConfigResult};
pub use model::{BinModel, PrecipitationKind};
pub use pipeline::{IntervalOutcome, Pipeline, PipelineBuilder};
pub use ring::SampleRing;
pub use sampler::SampleSource;
pub use spectral::SpectralAnalyzer;
pub use statistics::{classify, Statistics};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
