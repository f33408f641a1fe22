#![forbid(unsafe_code)]
//! Estimate and remove a known stem's contribution from a mix recording.
//!
//! `stemsub` takes an isolated stem (say, the backing track) and a mix that
//! contains it, recorded or processed through some unknown filter and
//! arriving some unknown fraction of a sample late. It recovers the delay by
//! maximizing spectral coherence, estimates the per-bin complex EQ that maps
//! the stem onto its bleed in the mix, and subtracts the filtered stem.
//!
//! # Quick Start
//!
//! ```
//! use stemsub::{Logger, Signal, SubtractConfig};
//!
//! let stem: Vec<f64> = (0..20000).map(|i| ((i * 7919) % 1000) as f64 / 500.0 - 1.0).collect();
//! // The mix is the stem, 3 samples late and at half level.
//! let mut mix = vec![0.0; stem.len()];
//! for i in 3..stem.len() {
//!     mix[i] = 0.5 * stem[i - 3];
//! }
//! let stem = Signal::new(stem, 44100).unwrap();
//! let mix = Signal::new(mix, 44100).unwrap();
//!
//! let mut config = SubtractConfig::default();
//! config.grain = config.grain.with_inner_grain_len(64).with_interval_len(16);
//!
//! let result = stemsub::subtract_stem(&stem, &mix, Some(3.0), &config, &mut Logger::none()).unwrap();
//! assert!(result.residual.data[1000..19000].iter().all(|r| r.abs() < 1e-6));
//! ```
//!
//! # Progress
//!
//! Long searches report through a [`Logger`]. [`Logger::log_facade`] forwards
//! to the `log` crate; [`Logger::from_fn`] takes a closure.

pub mod config;
pub mod core;
pub mod delay;
pub mod eq;
pub mod error;
pub mod grains;
pub mod io;
pub mod subtract;
pub mod timestamp;

pub use config::{DelaySearchConfig, EqConfig, GrainConfig, SubtractConfig};
pub use core::progress::{Logger, Progress, ProgressSink};
pub use core::types::{Bin, EqProfile, Sample, Signal};
pub use core::window::{GrainLayout, WindowType};
pub use delay::{find_delay_stem, DelayEstimate, FindDelayStem};
pub use eq::{estimate_eq_profile, SpectraToEqProfile, SpectraToEqProfiles};
pub use error::{Result, StemSubError};
pub use subtract::{
    subtract_intermediate, subtract_stem, IntermediateSource, StemInMix, Subtraction,
};

/// Estimates the stem delay with the settings of a whole-pipeline config.
pub fn find_delay(
    stem: &Signal,
    mix: &Signal,
    config: &SubtractConfig,
    logger: &mut Logger,
) -> Result<DelayEstimate> {
    config.validate()?;
    find_delay_stem(
        stem,
        mix,
        &config.grain,
        &config.eq,
        &config.delay_search,
        logger,
    )
}

/// Renders the stem as it sounds in the mix at a known delay.
pub fn stem_in_mix(
    stem: &Signal,
    mix: &Signal,
    delay_samples: f64,
    config: &SubtractConfig,
    logger: &mut Logger,
) -> Result<Signal> {
    config.validate()?;
    let rendered = StemInMix::new(&stem.data, &mix.data, delay_samples, &config.grain, &config.eq)?
        .with_running(config.running)
        .render(logger)?;
    Signal::new(rendered, mix.sample_rate)
}
