//! Streaming EQ estimation over a trailing window of frames.

use crate::config::EqConfig;
use crate::core::divide::{co_rotate, SafeDivider};
use crate::core::ring_buffer::{RingBuffer, SpectrumSource};
use crate::core::types::{Bin, BIN_ZERO};
use crate::error::Result;

/// Running totals of co-rotated frames since the estimator was created.
#[derive(Debug, Clone)]
struct CumulativeSums {
    abs_stem: Vec<f64>,
    rotated_mix: Vec<Bin>,
}

impl CumulativeSums {
    fn zeroed(len: usize) -> Self {
        Self {
            abs_stem: vec![0.0; len],
            rotated_mix: vec![BIN_ZERO; len],
        }
    }
}

/// Estimates an EQ profile over the trailing `lookbehind + 1` frames,
/// updated every frame at a cost independent of the window size.
///
/// A ring of `lookbehind + 2` cumulative sums is kept. After frame `t` the
/// newest slot holds the total up to `t` and the oldest the total up to
/// `t - lookbehind - 1`, so the window sum is their difference. The slot
/// standing for "before the first frame" starts zeroed. The first
/// `lookbehind` frames only fill the window and yield no estimate.
#[derive(Debug, Clone)]
pub struct SpectraToEqProfiles {
    lookbehind: usize,
    reciprocal: bool,
    cumsums: RingBuffer<CumulativeSums>,
    window_abs_stem: Vec<f64>,
    window_rotated_mix: Vec<Bin>,
    divider: SafeDivider,
    out: Vec<Bin>,
    num_of_frames: usize,
}

impl SpectraToEqProfiles {
    /// Creates an estimator for spectra of `len` bins.
    pub fn new(len: usize, lookbehind: usize, max_abs_result: f64, reciprocal: bool) -> Result<Self> {
        Ok(Self {
            lookbehind,
            reciprocal,
            cumsums: RingBuffer::with_lookbehind(|| CumulativeSums::zeroed(len), lookbehind + 1),
            window_abs_stem: vec![0.0; len],
            window_rotated_mix: vec![BIN_ZERO; len],
            divider: SafeDivider::new(max_abs_result, len)?,
            out: vec![BIN_ZERO; len],
            num_of_frames: 0,
        })
    }

    pub fn from_config(len: usize, config: &EqConfig) -> Result<Self> {
        config.validate()?;
        Self::new(len, config.lookbehind, config.max_abs_result, config.reciprocal)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.out.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.out.is_empty()
    }

    #[inline]
    pub fn lookbehind(&self) -> usize {
        self.lookbehind
    }

    /// Frames consumed so far.
    #[inline]
    pub fn num_of_frames(&self) -> usize {
        self.num_of_frames
    }

    /// Whether the window is full and estimates are being produced.
    #[inline]
    pub fn is_primed(&self) -> bool {
        self.num_of_frames > self.lookbehind
    }

    /// Consumes one frame and returns the updated estimate once the window
    /// is full.
    ///
    /// # Panics
    /// If either spectrum does not have the configured length.
    pub fn add_frame(&mut self, stem: &[Bin], mix: &[Bin]) -> Option<&[Bin]> {
        assert!(
            stem.len() == self.len() && mix.len() == self.len(),
            "spectra must match the estimator length"
        );
        let (prev, curr) = self.cumsums.increment_and_get_previous_and_newest();
        for i in 0..stem.len() {
            let (abs_stem, rotated_mix) = co_rotate(stem[i], mix[i]);
            curr.abs_stem[i] = prev.abs_stem[i] + abs_stem;
            curr.rotated_mix[i] = prev.rotated_mix[i] + rotated_mix;
        }
        self.num_of_frames += 1;

        if !self.is_primed() {
            log::trace!(
                "running EQ warming up: {}/{} frames",
                self.num_of_frames,
                self.lookbehind + 1
            );
            return None;
        }

        let (newest, oldest) = self.cumsums.newest_and_oldest();
        for i in 0..self.out.len() {
            self.window_abs_stem[i] = newest.abs_stem[i] - oldest.abs_stem[i];
            self.window_rotated_mix[i] = newest.rotated_mix[i] - oldest.rotated_mix[i];
        }
        if self.reciprocal {
            self.divider
                .divide(&self.window_abs_stem, &self.window_rotated_mix, &mut self.out);
        } else {
            self.divider
                .divide(&self.window_rotated_mix, &self.window_abs_stem, &mut self.out);
        }
        Some(&self.out)
    }

    /// Consumes the newest spectrum of each source.
    #[inline]
    pub fn step<S, M>(&mut self, stem: &S, mix: &M) -> Option<&[Bin]>
    where
        S: SpectrumSource + ?Sized,
        M: SpectrumSource + ?Sized,
    {
        self.add_frame(stem.newest_spectrum(), mix.newest_spectrum())
    }

    /// The last produced estimate; zeros before the window fills.
    pub fn eq_profile(&self) -> &[Bin] {
        &self.out
    }
}
