//! Estimating how late a stem arrives in a mix.

use crate::config::{DelaySearchConfig, EqConfig, GrainConfig};
use crate::core::fft::SpectrumTransform;
use crate::core::progress::Logger;
use crate::core::types::{Bin, Sample, Signal, Spectrum, BIN_ZERO};
use crate::core::window::{GrainLayout, WindowType};
use crate::delay::hone_in::{hone_in, HoneInParams};
use crate::eq::single::SpectraToEqProfile;
use crate::error::{Result, StemSubError};
use crate::grains::framer::AudioToHannGrains;

/// A fractional delay with the score that selected it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayEstimate {
    /// Delay of the stem within the mix, in samples.
    pub samples: f64,
    /// Sum of EQ profile magnitudes at this delay.
    pub score: f64,
}

impl DelayEstimate {
    /// Delay in seconds at `sample_rate`.
    #[inline]
    pub fn seconds(&self, sample_rate: u32) -> f64 {
        self.samples / sample_rate as f64
    }
}

/// Converts seconds to (fractional) samples.
#[inline]
pub fn seconds_to_samples(seconds: f64, sample_rate: u32) -> f64 {
    seconds * sample_rate as f64
}

/// Searches for the stem delay that makes the stem most coherent with the
/// mix.
///
/// A trial delay is scored by estimating the whole-span EQ profile over
/// `num_of_iterations_per_guess` grain pairs, with the stem framed that many
/// samples earlier, and summing the profile's magnitudes. Misalignment
/// smears cross-spectral energy and lowers the sum. Mix spectra do not depend
/// on the delay and are computed once.
#[derive(Debug)]
pub struct FindDelayStem<'a> {
    stem: &'a [Sample],
    layout: GrainLayout,
    window_type: WindowType,
    search: DelaySearchConfig,
    transform: SpectrumTransform,
    stem_spectrum: Spectrum,
    mix_spectra: Vec<Spectrum>,
    estimator: SpectraToEqProfile,
}

impl<'a> FindDelayStem<'a> {
    pub fn new(
        stem: &'a [Sample],
        mix: &'a [Sample],
        grain: &GrainConfig,
        eq: &EqConfig,
        search: &DelaySearchConfig,
    ) -> Result<Self> {
        search.validate()?;
        let layout = grain.layout()?;
        let len = layout.grain_len();
        let estimator = SpectraToEqProfile::from_config(len, eq)?;

        let n = search.num_of_iterations_per_guess;
        let minimum = search.start_i
            + ((n - 1) * layout.interval_len() + layout.inner_grain_len()) as i64;
        if (mix.len() as i64) < minimum {
            return Err(StemSubError::InputTooShort {
                provided: mix.len(),
                minimum: minimum.max(0) as usize,
            });
        }

        let mut transform = SpectrumTransform::new(len);
        let mut mix_grains =
            AudioToHannGrains::with_window_type(mix, layout, search.start_i, n, 0.0, grain.window)?;
        let mut mix_spectra = Vec::with_capacity(n);
        while let Some(g) = mix_grains.next_grain() {
            mix_spectra.push(transform.forward_to_vec(g));
        }
        log::debug!(
            "delay search over {} grains of {} samples from {}",
            n,
            len,
            search.start_i
        );

        Ok(Self {
            stem,
            layout,
            window_type: grain.window,
            search: *search,
            transform,
            stem_spectrum: vec![BIN_ZERO; len],
            mix_spectra,
            estimator,
        })
    }

    #[inline]
    pub fn layout(&self) -> &GrainLayout {
        &self.layout
    }

    /// Sum of EQ magnitudes with the stem delayed by `delay` samples.
    ///
    /// A delay that cannot be framed scores NaN, which never wins.
    pub fn score(&mut self, delay: f64) -> f64 {
        let mut stem_grains = match AudioToHannGrains::with_window_type(
            self.stem,
            self.layout,
            self.search.start_i,
            self.mix_spectra.len(),
            delay,
            self.window_type,
        ) {
            Ok(grains) => grains,
            Err(e) => {
                log::warn!("cannot score delay {}: {}", delay, e);
                return f64::NAN;
            }
        };

        self.estimator.reset();
        for mix_spectrum in &self.mix_spectra {
            let Some(grain) = stem_grains.next_grain() else {
                break;
            };
            self.transform.forward(grain, &mut self.stem_spectrum);
            self.estimator.add_frame(&self.stem_spectrum, mix_spectrum);
        }
        let score: f64 = self
            .estimator
            .calculate_eq_profile()
            .iter()
            .map(|b| b.norm())
            .sum();
        log::trace!("delay {} scored {}", delay, score);
        score
    }

    /// EQ profile over the search span with the stem delayed by `delay`.
    pub fn eq_profile_at(&mut self, delay: f64) -> Vec<Bin> {
        self.score(delay);
        self.estimator.eq_profile().to_vec()
    }

    /// Runs the search.
    pub fn run(&mut self, logger: &mut Logger) -> Result<DelayEstimate> {
        let params = HoneInParams::from(&self.search);
        let winning = hone_in(|delay| self.score(delay), &params, logger)?;
        log::info!("stem delay estimate: {:.4} samples", winning.value);
        Ok(DelayEstimate {
            samples: winning.value,
            score: winning.score,
        })
    }
}

/// Estimates the delay of `stem` within `mix`.
pub fn find_delay_stem(
    stem: &Signal,
    mix: &Signal,
    grain: &GrainConfig,
    eq: &EqConfig,
    search: &DelaySearchConfig,
    logger: &mut Logger,
) -> Result<DelayEstimate> {
    if stem.sample_rate != mix.sample_rate {
        return Err(StemSubError::invalid(
            "sample_rate",
            format!(
                "stem ({} Hz) and mix ({} Hz) must share a sample rate",
                stem.sample_rate, mix.sample_rate
            ),
        ));
    }
    FindDelayStem::new(&stem.data, &mix.data, grain, eq, search)?.run(logger)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn noise(len: usize) -> Vec<Sample> {
        let mut rng = StdRng::seed_from_u64(42);
        (0..len).map(|_| rng.random::<f64>() - 0.5).collect()
    }

    fn small_config() -> (GrainConfig, DelaySearchConfig) {
        (
            GrainConfig::default().with_inner_grain_len(16).with_interval_len(4),
            DelaySearchConfig::default()
                .with_start_i(64)
                .with_iterations_per_guess(3000),
        )
    }

    #[test]
    fn test_whole_sample_delay() {
        let stem = noise(13000);
        let mut mix = vec![0.0; stem.len()];
        for i in 5..stem.len() {
            mix[i] = 2.0 * stem[i - 5];
        }
        let (grain, search) = small_config();
        let mut finder = FindDelayStem::new(&stem, &mix, &grain, &EqConfig::default(), &search).unwrap();
        let estimate = finder.run(&mut Logger::none()).unwrap();
        assert!((estimate.samples - 5.0).abs() < 0.1, "got {}", estimate.samples);
        assert!(finder.score(5.0) > finder.score(4.0));
    }

    #[test]
    fn test_silent_input_settles_near_first_guess() {
        let (grain, search) = small_config();
        let sound = noise(13000);
        let silence = vec![0.0; sound.len()];
        for (stem, mix) in [(&sound, &silence), (&silence, &sound)] {
            let mut finder = FindDelayStem::new(stem, mix, &grain, &EqConfig::default(), &search).unwrap();
            let estimate = finder.run(&mut Logger::none()).unwrap();
            assert!(estimate.samples.is_finite());
            assert!(estimate.samples.abs() <= 3.0, "got {}", estimate.samples);
            assert_eq!(estimate.score, 0.0);
        }
    }

    #[test]
    fn test_rejects_short_mix() {
        let stem = noise(100);
        let (grain, search) = small_config();
        assert!(matches!(
            FindDelayStem::new(&stem, &stem, &grain, &EqConfig::default(), &search),
            Err(StemSubError::InputTooShort { .. })
        ));
    }

    #[test]
    fn test_mismatched_sample_rates() {
        let a = Signal::new(vec![0.0; 13000], 44100).unwrap();
        let b = Signal::new(vec![0.0; 13000], 48000).unwrap();
        let (grain, search) = small_config();
        assert!(find_delay_stem(&a, &b, &grain, &EqConfig::default(), &search, &mut Logger::none()).is_err());
    }

    #[test]
    fn test_seconds_conversion() {
        let estimate = DelayEstimate {
            samples: 4410.0,
            score: 0.0,
        };
        assert!((estimate.seconds(44100) - 0.1).abs() < 1e-12);
        assert!((seconds_to_samples(0.1, 44100) - 4410.0).abs() < 1e-9);
    }
}
