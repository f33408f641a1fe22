//! Rendering the stem as heard in the mix, and removing it.
//!
//! Every stem grain is filtered by an EQ profile and overlap-added at its
//! position, either into silence (the stem as it sounds in the mix) or
//! subtracted from a copy of the mix (the mix without the stem).
//!
//! Synthesis grains start `inner_grain_len - interval_len` samples before the
//! signal so that every output sample receives all of its overlapping
//! grains. In single mode one profile estimated over that whole span filters
//! every grain. In running mode each grain is filtered by the streaming
//! estimate over `lookbehind + 1` analysis frames, `lookahead` of which come
//! after the grain.
//!
//! An intermediate recording can be rendered in place of the stem. The
//! stem-to-mix EQ is still estimated from the stem, while the grains come from
//! the intermediate, filtered first by a fixed intermediate-to-stem profile.

use crate::config::{EqConfig, GrainConfig, SubtractConfig};
use crate::core::fft::SpectrumTransform;
use crate::core::progress::{Logger, Progress};
use crate::core::ring_buffer::{spectra_ring, RingBuffer};
use crate::core::types::{Bin, EqProfile, Sample, Signal, BIN_ZERO};
use crate::core::window::{GrainLayout, WindowType};
use crate::delay::find_delay::{find_delay_stem, DelayEstimate};
use crate::eq::apply::{apply_eq_profile, ApplyEqProfileToOldest};
use crate::eq::audio_pair::AudioPairToEqProfile;
use crate::eq::running::SpectraToEqProfiles;
use crate::error::{Result, StemSubError};
use crate::grains::framer::AudioToHannGrains;
use crate::grains::overlap_add::{AddGrainsToAudio, OverlapMode};
use crate::grains::ranges::grains_to_cover;

/// Stem-in-mix renderer for one stem/mix pair at a known delay.
#[derive(Debug, Clone)]
pub struct StemInMix<'a> {
    stem: &'a [Sample],
    mix: &'a [Sample],
    delay: f64,
    layout: GrainLayout,
    window_type: WindowType,
    eq: EqConfig,
    running: bool,
    intermediate: Option<Intermediate<'a>>,
}

/// Audio rendered in place of the stem.
#[derive(Debug, Clone)]
struct Intermediate<'a> {
    audio: &'a [Sample],
    to_stem: EqProfile,
    delay: f64,
}

impl<'a> StemInMix<'a> {
    /// `delay` is how many samples later the stem sounds in the mix.
    pub fn new(
        stem: &'a [Sample],
        mix: &'a [Sample],
        delay: f64,
        grain: &GrainConfig,
        eq: &EqConfig,
    ) -> Result<Self> {
        eq.validate()?;
        if !delay.is_finite() {
            return Err(StemSubError::invalid("delay", format!("must be finite, got {}", delay)));
        }
        Ok(Self {
            stem,
            mix,
            delay,
            layout: grain.layout()?,
            window_type: grain.window,
            eq: *eq,
            running: false,
            intermediate: None,
        })
    }

    /// Renders `audio` through `to_stem` in place of the stem's own grains.
    ///
    /// `delay` is how many samples later `audio` sounds in the mix and
    /// `to_stem` maps its spectrum onto the stem's.
    pub fn with_intermediate(
        mut self,
        audio: &'a [Sample],
        to_stem: EqProfile,
        delay: f64,
    ) -> Result<Self> {
        if !delay.is_finite() {
            return Err(StemSubError::invalid(
                "intermediate delay",
                format!("must be finite, got {}", delay),
            ));
        }
        if to_stem.len() != self.layout.grain_len() {
            return Err(StemSubError::invalid(
                "intermediate EQ profile",
                format!(
                    "has {} bins but grains have {}",
                    to_stem.len(),
                    self.layout.grain_len()
                ),
            ));
        }
        self.intermediate = Some(Intermediate {
            audio,
            to_stem,
            delay,
        });
        Ok(self)
    }

    /// Selects the streaming estimate instead of one whole-span profile.
    pub fn with_running(mut self, running: bool) -> Self {
        self.running = running;
        self
    }

    #[inline]
    pub fn delay(&self) -> f64 {
        self.delay
    }

    /// Offset of the first synthesis grain.
    #[inline]
    fn first_start(&self) -> i64 {
        -((self.layout.inner_grain_len() - self.layout.interval_len()) as i64)
    }

    /// Number of synthesis grains needed to cover the mix.
    #[inline]
    fn num_of_grains(&self) -> usize {
        grains_to_cover(self.first_start(), self.layout.interval_len(), self.mix.len())
    }

    /// The stem as it sounds in the mix.
    pub fn render(&self, logger: &mut Logger) -> Result<Vec<Sample>> {
        self.render_into(vec![0.0; self.mix.len()], OverlapMode::Add, logger)
    }

    /// The mix with the stem removed.
    pub fn subtract(&self, logger: &mut Logger) -> Result<Vec<Sample>> {
        self.render_into(self.mix.to_vec(), OverlapMode::Subtract, logger)
    }

    /// One EQ profile over the whole mix.
    pub fn estimate_eq_profile(&self) -> Result<EqProfile> {
        let mut pair = AudioPairToEqProfile::with_window_type(
            self.stem,
            self.mix,
            self.layout,
            self.first_start(),
            self.num_of_grains(),
            self.delay,
            self.window_type,
            &self.eq,
        )?;
        pair.run();
        Ok(pair.calculate_eq_profile().to_vec())
    }

    /// One profile mapping `audio`, `delay` samples late in the mix, onto
    /// the stem.
    pub fn estimate_intermediate_eq_profile(
        &self,
        audio: &[Sample],
        delay: f64,
    ) -> Result<EqProfile> {
        let mut pair = AudioPairToEqProfile::with_window_type(
            audio,
            self.stem,
            self.layout,
            self.first_start(),
            self.num_of_grains(),
            delay - self.delay,
            self.window_type,
            &self.eq,
        )?;
        pair.run();
        Ok(pair.calculate_eq_profile().to_vec())
    }

    /// Audio and delay of the grains that get filtered and emitted.
    fn source(&self) -> (&'a [Sample], f64) {
        match &self.intermediate {
            Some(i) => (i.audio, i.delay),
            None => (self.stem, self.delay),
        }
    }

    fn render_into(
        &self,
        target: Vec<Sample>,
        mode: OverlapMode,
        logger: &mut Logger,
    ) -> Result<Vec<Sample>> {
        let len = self.layout.grain_len();
        let adder = AddGrainsToAudio::new(
            target,
            self.first_start() - self.layout.left_pad_len() as i64,
            self.layout.interval_len(),
            self.num_of_grains(),
            len,
            mode,
        )?;
        let synth = Synthesis {
            transform: SpectrumTransform::new(len),
            filtered: vec![BIN_ZERO; len],
            grain: vec![0.0; len],
            to_stem: self.intermediate.as_ref().map(|i| i.to_stem.clone()),
            adder,
        };
        log::debug!(
            "{} {}: {} grains of {} samples, delay {}, {} EQ",
            match mode {
                OverlapMode::Add => "rendering",
                OverlapMode::Subtract => "subtracting",
            },
            if self.intermediate.is_some() { "intermediate" } else { "stem" },
            self.num_of_grains(),
            len,
            self.source().1,
            if self.running { "running" } else { "single" }
        );
        if self.running {
            self.render_running(synth, logger)
        } else {
            self.render_single(synth, logger)
        }
    }

    fn render_single(&self, mut synth: Synthesis, logger: &mut Logger) -> Result<Vec<Sample>> {
        let eq_profile = self.estimate_eq_profile()?;
        let num_of_grains = self.num_of_grains();
        let (audio, delay) = self.source();
        let mut grains = AudioToHannGrains::with_window_type(
            audio,
            self.layout,
            self.first_start(),
            num_of_grains,
            delay,
            self.window_type,
        )?;
        let mut spectrum = vec![BIN_ZERO; self.layout.grain_len()];
        while let Some(grain) = grains.next_grain() {
            synth.transform.forward(grain, &mut spectrum);
            apply_eq_profile(&eq_profile, &spectrum, &mut synth.filtered);
            synth.emit();
            let position = synth.adder.position();
            logger.log_with(|| {
                Progress::new("rendering stem").with_iteration(position, Some(num_of_grains))
            });
        }
        Ok(synth.adder.into_audio())
    }

    fn render_running(&self, mut synth: Synthesis, logger: &mut Logger) -> Result<Vec<Sample>> {
        let len = self.layout.grain_len();
        let (lookbehind, lookahead) = (self.eq.lookbehind, self.eq.lookahead);
        let interval_len = self.layout.interval_len() as i64;
        let num_of_grains = self.num_of_grains();
        let analysis_start = self.first_start() - (lookbehind - lookahead) as i64 * interval_len;
        let num_of_frames = lookbehind + num_of_grains;

        let mut stem_grains = AudioToHannGrains::with_window_type(
            self.stem,
            self.layout,
            analysis_start,
            num_of_frames,
            self.delay,
            self.window_type,
        )?;
        let mut mix_grains = AudioToHannGrains::with_window_type(
            self.mix,
            self.layout,
            analysis_start,
            num_of_frames,
            0.0,
            self.window_type,
        )?;
        let mut intermediate = match &self.intermediate {
            Some(i) => Some((
                AudioToHannGrains::with_window_type(
                    i.audio,
                    self.layout,
                    analysis_start,
                    num_of_frames,
                    i.delay,
                    self.window_type,
                )?,
                spectra_ring(len, lookahead),
            )),
            None => None,
        };
        let mut stem_spectra = spectra_ring(len, lookahead);
        let mut mix_spectrum = RingBuffer::single(vec![BIN_ZERO; len]);
        let mut estimator = SpectraToEqProfiles::from_config(len, &self.eq)?;
        let mut apply = ApplyEqProfileToOldest::new(len);

        for frame in 0..num_of_frames {
            let (Some(stem_grain), Some(mix_grain)) =
                (stem_grains.next_grain(), mix_grains.next_grain())
            else {
                break;
            };
            synth
                .transform
                .forward(stem_grain, stem_spectra.increment_and_get_newest());
            synth
                .transform
                .forward(mix_grain, mix_spectrum.newest_mut());
            if let Some((grains, spectra)) = intermediate.as_mut() {
                let Some(grain) = grains.next_grain() else {
                    break;
                };
                synth.transform.forward(grain, spectra.increment_and_get_newest());
            }

            if let Some(eq_profile) = estimator.step(&stem_spectra, &mix_spectrum) {
                let source = match &intermediate {
                    Some((_, spectra)) => spectra,
                    None => &stem_spectra,
                };
                synth
                    .filtered
                    .copy_from_slice(apply.apply(eq_profile, source));
                synth.emit();
            }
            logger.log_with(|| {
                Progress::new("subtracting with running EQ")
                    .with_iteration(frame + 1, Some(num_of_frames))
            });
        }
        Ok(synth.adder.into_audio())
    }
}

/// Buffers shared by both rendering modes.
struct Synthesis {
    transform: SpectrumTransform,
    filtered: Vec<Bin>,
    grain: Vec<Sample>,
    /// Intermediate-to-stem profile applied on top of the estimated EQ.
    to_stem: Option<EqProfile>,
    adder: AddGrainsToAudio,
}

impl Synthesis {
    /// Inverse transforms the filtered spectrum and overlap-adds it.
    #[inline]
    fn emit(&mut self) {
        if let Some(to_stem) = &self.to_stem {
            for (bin, &gain) in self.filtered.iter_mut().zip(to_stem) {
                *bin *= gain;
            }
        }
        self.transform.inverse(&self.filtered, &mut self.grain);
        self.adder.add_grain(&self.grain);
    }
}

/// Outcome of removing a stem from a mix.
#[derive(Debug, Clone)]
pub struct Subtraction {
    /// The mix without the stem.
    pub residual: Signal,
    /// Delay used, in samples.
    pub delay_samples: f64,
    /// Search result, when the delay was searched for.
    pub estimate: Option<DelayEstimate>,
}

/// A recording rendered in place of the stem, related to it by a fixed EQ.
#[derive(Debug, Clone)]
pub struct IntermediateSource<'a> {
    pub signal: &'a Signal,
    /// How many samples later the intermediate sounds in the mix; the stem
    /// delay when `None`.
    pub delay_samples: Option<f64>,
    /// Intermediate-to-stem profile; estimated from the two signals when
    /// `None`.
    pub eq_profile: Option<EqProfile>,
}

impl<'a> IntermediateSource<'a> {
    pub fn new(signal: &'a Signal) -> Self {
        Self {
            signal,
            delay_samples: None,
            eq_profile: None,
        }
    }

    pub fn with_delay(mut self, delay_samples: f64) -> Self {
        self.delay_samples = Some(delay_samples);
        self
    }

    pub fn with_eq_profile(mut self, eq_profile: EqProfile) -> Self {
        self.eq_profile = Some(eq_profile);
        self
    }
}

/// Removes `stem` from `mix`, searching for the delay when none is given.
pub fn subtract_stem(
    stem: &Signal,
    mix: &Signal,
    delay_samples: Option<f64>,
    config: &SubtractConfig,
    logger: &mut Logger,
) -> Result<Subtraction> {
    subtract_with(stem, None, mix, delay_samples, config, logger)
}

/// Removes an intermediate recording of the stem from `mix`.
///
/// The stem-to-mix EQ and, when no delay is given, the stem delay are
/// estimated from `stem`; the subtracted grains come from `intermediate`.
pub fn subtract_intermediate(
    stem: &Signal,
    intermediate: &IntermediateSource<'_>,
    mix: &Signal,
    delay_samples: Option<f64>,
    config: &SubtractConfig,
    logger: &mut Logger,
) -> Result<Subtraction> {
    subtract_with(stem, Some(intermediate), mix, delay_samples, config, logger)
}

fn check_sample_rates(name: &'static str, a: &Signal, mix: &Signal) -> Result<()> {
    if a.sample_rate != mix.sample_rate {
        return Err(StemSubError::invalid(
            "sample_rate",
            format!(
                "{} ({} Hz) and mix ({} Hz) must share a sample rate",
                name, a.sample_rate, mix.sample_rate
            ),
        ));
    }
    Ok(())
}

fn subtract_with(
    stem: &Signal,
    intermediate: Option<&IntermediateSource<'_>>,
    mix: &Signal,
    delay_samples: Option<f64>,
    config: &SubtractConfig,
    logger: &mut Logger,
) -> Result<Subtraction> {
    config.validate()?;
    check_sample_rates("stem", stem, mix)?;
    if let Some(i) = intermediate {
        check_sample_rates("intermediate", i.signal, mix)?;
    }
    let estimate = match delay_samples {
        Some(_) => None,
        None => Some(find_delay_stem(
            stem,
            mix,
            &config.grain,
            &config.eq,
            &config.delay_search,
            logger,
        )?),
    };
    let delay = delay_samples.or(estimate.map(|e| e.samples)).unwrap_or(0.0);
    let mut renderer = StemInMix::new(&stem.data, &mix.data, delay, &config.grain, &config.eq)?
        .with_running(config.running);
    if let Some(i) = intermediate {
        let intermediate_delay = i.delay_samples.unwrap_or(delay);
        let to_stem = match &i.eq_profile {
            Some(profile) => profile.clone(),
            None => renderer.estimate_intermediate_eq_profile(&i.signal.data, intermediate_delay)?,
        };
        renderer = renderer.with_intermediate(&i.signal.data, to_stem, intermediate_delay)?;
    }
    let residual = renderer.subtract(logger)?;
    Ok(Subtraction {
        residual: Signal::new(residual, mix.sample_rate)?,
        delay_samples: delay,
        estimate,
    })
}
