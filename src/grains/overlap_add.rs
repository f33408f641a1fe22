//! Inverse framing: adding or subtracting grains back into a signal.

use crate::core::types::Sample;
use crate::error::{Result, StemSubError};
use crate::grains::ranges::{GrainPhase, GrainRanges};

/// Whether grains are added to or subtracted from the signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlapMode {
    #[default]
    Add,
    Subtract,
}

/// Overlap-adds grains into an owned signal buffer.
///
/// Grain `g` lands at `start + g * interval_len`; samples falling outside the
/// signal are dropped. With the same parameters as an
/// [`AudioToGrains`](crate::grains::AudioToGrains) using an
/// overlap-normalized window, framing followed by subtracting every grain
/// leaves zero wherever the signal was covered by complete overlaps.
#[derive(Debug, Clone)]
pub struct AddGrainsToAudio {
    audio: Vec<Sample>,
    grain_len: usize,
    num_of_grains: usize,
    mode: OverlapMode,
    ranges: GrainRanges,
    next: usize,
}

impl AddGrainsToAudio {
    pub fn new(
        audio: Vec<Sample>,
        start: i64,
        interval_len: usize,
        num_of_grains: usize,
        grain_len: usize,
        mode: OverlapMode,
    ) -> Result<Self> {
        if interval_len == 0 {
            return Err(StemSubError::invalid("interval_len", "must be greater than 0"));
        }
        if grain_len == 0 {
            return Err(StemSubError::invalid("grain_len", "must be greater than 0"));
        }
        let ranges = GrainRanges::new(start, grain_len, interval_len, audio.len(), num_of_grains);
        Ok(Self {
            audio,
            grain_len,
            num_of_grains,
            mode,
            ranges,
            next: 0,
        })
    }

    #[inline]
    pub fn mode(&self) -> OverlapMode {
        self.mode
    }

    #[inline]
    pub fn num_of_grains(&self) -> usize {
        self.num_of_grains
    }

    /// Number of grains consumed so far.
    #[inline]
    pub fn position(&self) -> usize {
        self.next
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        self.next >= self.num_of_grains
    }

    pub fn audio(&self) -> &[Sample] {
        &self.audio
    }

    pub fn into_audio(self) -> Vec<Sample> {
        self.audio
    }

    /// Adds (or subtracts) the next grain. Returns `false`, leaving the
    /// signal untouched, once every grain has been consumed.
    ///
    /// # Panics
    /// If `grain` is not `grain_len` samples long.
    pub fn add_grain(&mut self, grain: &[Sample]) -> bool {
        assert_eq!(grain.len(), self.grain_len, "grain length");
        let g = self.next;
        let Some(phase) = self.ranges.phase_of(g) else {
            return false;
        };
        self.next += 1;

        let start = self.ranges.grain_start(g);
        let audio_len = self.audio.len();
        let len = self.grain_len;
        let (dst, src) = match phase {
            GrainPhase::Before | GrainPhase::After => return true,
            GrainPhase::Entering => {
                let offset = (-start) as usize;
                (&mut self.audio[..len - offset], &grain[offset..])
            }
            GrainPhase::Full => {
                let s = start as usize;
                (&mut self.audio[s..s + len], grain)
            }
            GrainPhase::Island => {
                let offset = (-start) as usize;
                (&mut self.audio[..], &grain[offset..offset + audio_len])
            }
            GrainPhase::Exiting => {
                let s = start as usize;
                (&mut self.audio[s..], &grain[..audio_len - s])
            }
        };
        accumulate(dst, src, self.mode);
        true
    }
}

#[inline]
fn accumulate(dst: &mut [Sample], src: &[Sample], mode: OverlapMode) {
    match mode {
        OverlapMode::Add => {
            for (d, &s) in dst.iter_mut().zip(src) {
                *d += s;
            }
        }
        OverlapMode::Subtract => {
            for (d, &s) in dst.iter_mut().zip(src) {
                *d -= s;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive(audio_len: usize, start: i64, h: usize, grains: &[Vec<Sample>]) -> Vec<Sample> {
        let mut out = vec![0.0; audio_len];
        for (g, grain) in grains.iter().enumerate() {
            for (i, &x) in grain.iter().enumerate() {
                let p = start + (g * h + i) as i64;
                if p >= 0 && (p as usize) < audio_len {
                    out[p as usize] += x;
                }
            }
        }
        out
    }

    #[test]
    fn test_matches_naive_overlap_add() {
        let grains: Vec<Vec<Sample>> = (0..15)
            .map(|g| (0..9).map(|i| (g * 9 + i) as f64 * 0.01).collect())
            .collect();
        for audio_len in [0usize, 4, 10, 40] {
            for start in [-30i64, -9, -4, 0, 2] {
                let mut adder =
                    AddGrainsToAudio::new(vec![0.0; audio_len], start, 3, grains.len(), 9, OverlapMode::Add)
                        .unwrap();
                for grain in &grains {
                    assert!(adder.add_grain(grain));
                }
                assert!(adder.is_done());
                assert!(!adder.add_grain(&grains[0]));
                let expected = naive(audio_len, start, 3, &grains);
                for (a, b) in adder.audio().iter().zip(&expected) {
                    assert!((a - b).abs() < 1e-12, "len {} start {}", audio_len, start);
                }
            }
        }
    }

    #[test]
    fn test_subtract_mode_negates() {
        let grain = vec![1.0; 4];
        let mut add = AddGrainsToAudio::new(vec![0.0; 8], 2, 2, 1, 4, OverlapMode::Add).unwrap();
        let mut sub = AddGrainsToAudio::new(vec![0.0; 8], 2, 2, 1, 4, OverlapMode::Subtract).unwrap();
        add.add_grain(&grain);
        sub.add_grain(&grain);
        for (a, s) in add.audio().iter().zip(sub.audio()) {
            assert_eq!(*a, -*s);
        }
        assert_eq!(add.into_audio(), vec![0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0]);
    }
}
