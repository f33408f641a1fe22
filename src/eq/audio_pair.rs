//! EQ estimation straight from a stem/mix signal pair.

use crate::config::EqConfig;
use crate::core::fft::SpectrumTransform;
use crate::core::ring_buffer::RingBuffer;
use crate::core::types::{Bin, Sample, Spectrum, BIN_ZERO};
use crate::core::window::{GrainLayout, WindowType};
use crate::eq::single::SpectraToEqProfile;
use crate::error::Result;
use crate::grains::framer::AudioToHannGrains;

/// Frames both signals in lockstep, transforms each grain pair and feeds it
/// to a whole-span estimator.
///
/// The stem is framed `delay_stem` samples earlier than the mix, so the
/// estimate describes a stem that reaches the mix that much later.
#[derive(Debug)]
pub struct AudioPairToEqProfile<'a> {
    stem_grains: AudioToHannGrains<'a>,
    mix_grains: AudioToHannGrains<'a>,
    transform: SpectrumTransform,
    stem_spectrum: RingBuffer<Spectrum>,
    mix_spectrum: RingBuffer<Spectrum>,
    estimator: SpectraToEqProfile,
}

impl<'a> AudioPairToEqProfile<'a> {
    /// `start` is the offset of the first mix grain; `num_of_grains` grain
    /// pairs are consumed in total.
    pub fn new(
        stem: &'a [Sample],
        mix: &'a [Sample],
        layout: GrainLayout,
        start: i64,
        num_of_grains: usize,
        delay_stem: f64,
        config: &EqConfig,
    ) -> Result<Self> {
        Self::with_window_type(
            stem,
            mix,
            layout,
            start,
            num_of_grains,
            delay_stem,
            WindowType::Hann,
            config,
        )
    }

    /// Same as [`new`](Self::new) with another window shape.
    #[allow(clippy::too_many_arguments)]
    pub fn with_window_type(
        stem: &'a [Sample],
        mix: &'a [Sample],
        layout: GrainLayout,
        start: i64,
        num_of_grains: usize,
        delay_stem: f64,
        window_type: WindowType,
        config: &EqConfig,
    ) -> Result<Self> {
        let len = layout.grain_len();
        Ok(Self {
            stem_grains: AudioToHannGrains::with_window_type(
                stem,
                layout,
                start,
                num_of_grains,
                delay_stem,
                window_type,
            )?,
            mix_grains: AudioToHannGrains::with_window_type(
                mix,
                layout,
                start,
                num_of_grains,
                0.0,
                window_type,
            )?,
            transform: SpectrumTransform::new(len),
            stem_spectrum: RingBuffer::single(vec![BIN_ZERO; len]),
            mix_spectrum: RingBuffer::single(vec![BIN_ZERO; len]),
            estimator: SpectraToEqProfile::from_config(len, config)?,
        })
    }

    #[inline]
    pub fn num_of_grains(&self) -> usize {
        self.mix_grains.num_of_grains()
    }

    /// Grain pairs consumed so far.
    #[inline]
    pub fn position(&self) -> usize {
        self.mix_grains.position()
    }

    #[inline]
    pub fn delay_stem(&self) -> f64 {
        self.stem_grains.delay()
    }

    /// Consumes one grain pair. Returns `false` once all are consumed.
    pub fn step(&mut self) -> bool {
        let (Some(stem_grain), Some(mix_grain)) =
            (self.stem_grains.next_grain(), self.mix_grains.next_grain())
        else {
            return false;
        };
        self.transform
            .forward(stem_grain, self.stem_spectrum.newest_mut());
        self.transform
            .forward(mix_grain, self.mix_spectrum.newest_mut());
        self.estimator.step(&self.stem_spectrum, &self.mix_spectrum);
        true
    }

    /// Consumes every remaining grain pair.
    pub fn run(&mut self) {
        while self.step() {}
    }

    /// Estimate over every grain pair consumed so far.
    pub fn calculate_eq_profile(&mut self) -> &[Bin] {
        self.estimator.calculate_eq_profile()
    }
}
