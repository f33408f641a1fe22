//! Forward framing: cutting a signal into windowed grains.

use crate::core::types::Sample;
use crate::core::window::{GrainLayout, WindowType};
use crate::error::{Result, StemSubError};
use crate::grains::ranges::{GrainPhase, GrainRanges};

/// Largest whole-sample delay accepted; beyond it `f64` no longer holds
/// every integer.
const MAX_WHOLE_DELAY: f64 = (1u64 << 53) as f64;

/// Cuts `audio` into windowed grains, one per [`next_grain`](Self::next_grain).
///
/// Grain `g` covers samples `start + g * interval_len ..` and is multiplied
/// by the window. Samples outside the signal read as zero. The grain buffer
/// is owned by the framer and overwritten on every step; work is split by
/// [`GrainPhase`] so that zero regions are written once per phase rather than
/// once per grain.
#[derive(Debug, Clone)]
pub struct AudioToGrains<'a> {
    audio: &'a [Sample],
    window: Vec<Sample>,
    interval_len: usize,
    num_of_grains: usize,
    ranges: GrainRanges,
    out: Vec<Sample>,
    next: usize,
    phase_idx: usize,
}

impl<'a> AudioToGrains<'a> {
    /// Creates a framer yielding `num_of_grains` grains of `window.len()`
    /// samples each.
    pub fn new(
        audio: &'a [Sample],
        start: i64,
        interval_len: usize,
        num_of_grains: usize,
        window: Vec<Sample>,
    ) -> Result<Self> {
        if interval_len == 0 {
            return Err(StemSubError::invalid("interval_len", "must be greater than 0"));
        }
        if window.is_empty() {
            return Err(StemSubError::invalid("window", "must not be empty"));
        }
        let ranges = GrainRanges::new(start, window.len(), interval_len, audio.len(), num_of_grains);
        Ok(Self {
            audio,
            out: vec![0.0; window.len()],
            window,
            interval_len,
            num_of_grains,
            ranges,
            next: 0,
            phase_idx: 0,
        })
    }

    #[inline]
    pub fn grain_len(&self) -> usize {
        self.window.len()
    }

    #[inline]
    pub fn interval_len(&self) -> usize {
        self.interval_len
    }

    #[inline]
    pub fn num_of_grains(&self) -> usize {
        self.num_of_grains
    }

    /// Number of grains produced so far.
    #[inline]
    pub fn position(&self) -> usize {
        self.next
    }

    /// Signal offset of the first sample of grain `g`.
    #[inline]
    pub fn grain_start(&self, g: usize) -> i64 {
        self.ranges.grain_start(g)
    }

    pub fn window(&self) -> &[Sample] {
        &self.window
    }

    /// The most recently produced grain.
    pub fn grain(&self) -> &[Sample] {
        &self.out
    }

    /// Produces the next grain, or `None` once all grains are done.
    pub fn next_grain(&mut self) -> Option<&[Sample]> {
        let g = self.next;
        if g >= self.num_of_grains {
            return None;
        }
        let phases = self.ranges.phases();
        while phases[self.phase_idx].1.end <= g {
            self.phase_idx += 1;
        }
        let (phase, range) = &phases[self.phase_idx];
        let (phase, first_in_phase) = (*phase, g == range.start);
        self.next += 1;

        let len = self.out.len();
        let start = self.ranges.grain_start(g);
        let audio_len = self.audio.len();

        match phase {
            GrainPhase::Before | GrainPhase::After => {
                if first_in_phase {
                    self.out.fill(0.0);
                }
            }
            GrainPhase::Entering => {
                let offset = (-start) as usize;
                if first_in_phase {
                    self.out[..offset].fill(0.0);
                }
                multiply_into(
                    &mut self.out[offset..],
                    &self.audio[..len - offset],
                    &self.window[offset..],
                );
            }
            GrainPhase::Full => {
                let s = start as usize;
                multiply_into(&mut self.out, &self.audio[s..s + len], &self.window);
            }
            GrainPhase::Island => {
                let offset = (-start) as usize;
                self.out.fill(0.0);
                multiply_into(
                    &mut self.out[offset..offset + audio_len],
                    self.audio,
                    &self.window[offset..offset + audio_len],
                );
            }
            GrainPhase::Exiting => {
                let s = start as usize;
                let valid = audio_len - s;
                // Each later grain has `interval_len` fewer valid samples.
                let zero_to = if first_in_phase {
                    len
                } else {
                    (valid + self.interval_len).min(len)
                };
                multiply_into(&mut self.out[..valid], &self.audio[s..], &self.window[..valid]);
                self.out[valid..zero_to].fill(0.0);
            }
        }

        Some(&self.out)
    }
}

#[inline]
fn multiply_into(out: &mut [Sample], audio: &[Sample], window: &[Sample]) {
    for ((o, &a), &w) in out.iter_mut().zip(audio).zip(window) {
        *o = a * w;
    }
}

/// Hann-windowed framer with fractional delay and zero padding.
///
/// `start` is the signal offset of the first inner grain. A delay of `d`
/// samples moves every grain `d` samples earlier in the signal: the whole
/// part shifts the grain start and the fractional part shifts the window.
/// Each grain is `left_pad_len` zeros, the windowed inner grain, then
/// `right_pad_len` zeros.
#[derive(Debug, Clone)]
pub struct AudioToHannGrains<'a> {
    layout: GrainLayout,
    start: i64,
    delay: f64,
    framer: AudioToGrains<'a>,
}

impl<'a> AudioToHannGrains<'a> {
    pub fn new(
        audio: &'a [Sample],
        layout: GrainLayout,
        start: i64,
        num_of_grains: usize,
        delay: f64,
    ) -> Result<Self> {
        Self::with_window_type(audio, layout, start, num_of_grains, delay, WindowType::Hann)
    }

    /// Same as [`new`](Self::new) with another window shape.
    pub fn with_window_type(
        audio: &'a [Sample],
        layout: GrainLayout,
        start: i64,
        num_of_grains: usize,
        delay: f64,
        window_type: WindowType,
    ) -> Result<Self> {
        if !delay.is_finite() {
            return Err(StemSubError::invalid("delay", format!("must be finite, got {}", delay)));
        }
        let whole = delay.floor();
        if whole.abs() > MAX_WHOLE_DELAY {
            return Err(StemSubError::invalid(
                "delay",
                format!("{} samples is out of range", delay),
            ));
        }
        let remainder = delay - whole;
        let framer_start = start
            .checked_sub(whole as i64)
            .and_then(|s| s.checked_sub(layout.left_pad_len() as i64))
            .ok_or_else(|| {
                StemSubError::invalid("delay", format!("{} samples moves the first grain out of range", delay))
            })?;
        let window = layout.padded_window(window_type, remainder);
        let framer = AudioToGrains::new(
            audio,
            framer_start,
            layout.interval_len(),
            num_of_grains,
            window,
        )?;
        log::trace!(
            "framing {} grains of {} samples from {} (delay {})",
            num_of_grains,
            layout.grain_len(),
            start,
            delay
        );
        Ok(Self {
            layout,
            start,
            delay,
            framer,
        })
    }

    #[inline]
    pub fn layout(&self) -> &GrainLayout {
        &self.layout
    }

    /// Offset of the first inner grain before the delay is applied.
    #[inline]
    pub fn start(&self) -> i64 {
        self.start
    }

    #[inline]
    pub fn delay(&self) -> f64 {
        self.delay
    }

    #[inline]
    pub fn num_of_grains(&self) -> usize {
        self.framer.num_of_grains()
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.framer.position()
    }

    pub fn window(&self) -> &[Sample] {
        self.framer.window()
    }

    pub fn grain(&self) -> &[Sample] {
        self.framer.grain()
    }

    /// Produces the next padded grain.
    #[inline]
    pub fn next_grain(&mut self) -> Option<&[Sample]> {
        self.framer.next_grain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive_grain(audio: &[Sample], start: i64, window: &[Sample]) -> Vec<Sample> {
        window
            .iter()
            .enumerate()
            .map(|(i, &w)| {
                let p = start + i as i64;
                if p < 0 || p >= audio.len() as i64 {
                    0.0
                } else {
                    audio[p as usize] * w
                }
            })
            .collect()
    }

    #[test]
    fn test_matches_naive_framing_in_every_phase() {
        let window: Vec<Sample> = (0..12).map(|i| 1.0 + i as f64 * 0.1).collect();
        for audio_len in [0usize, 5, 11, 30] {
            let audio: Vec<Sample> = (0..audio_len).map(|i| (i as f64 * 0.7).sin() + 2.0).collect();
            for start in [-40i64, -13, -12, -7, 0, 3] {
                let k = 20;
                let mut framer = AudioToGrains::new(&audio, start, 3, k, window.clone()).unwrap();
                let mut count = 0;
                while let Some(grain) = framer.next_grain() {
                    let expected = naive_grain(&audio, start + 3 * count as i64, &window);
                    assert_eq!(grain, &expected[..], "len {} start {} grain {}", audio_len, start, count);
                    count += 1;
                }
                assert_eq!(count, k);
                assert!(framer.next_grain().is_none());
            }
        }
    }

    #[test]
    fn test_rejects_zero_interval_and_empty_window() {
        let audio = [0.0; 4];
        assert!(AudioToGrains::new(&audio, 0, 0, 1, vec![1.0]).is_err());
        assert!(AudioToGrains::new(&audio, 0, 1, 1, vec![]).is_err());
    }

    #[test]
    fn test_hann_grains_have_zero_pads() {
        let audio = vec![1.0; 200];
        let layout = GrainLayout::new(Some(16), Some(4), None).unwrap().with_pads(3, 5);
        let mut framer = AudioToHannGrains::new(&audio, layout, 50, 4, 0.0).unwrap();
        while let Some(grain) = framer.next_grain() {
            assert_eq!(grain.len(), 24);
            assert!(grain[..3].iter().all(|&x| x == 0.0));
            assert!(grain[19..].iter().all(|&x| x == 0.0));
            assert!(grain[3..19].iter().any(|&x| x > 0.0));
        }
    }

    #[test]
    fn test_whole_delay_reads_earlier_samples() {
        let audio: Vec<Sample> = (0..100).map(|i| i as f64).collect();
        let layout = GrainLayout::new(Some(8), Some(4), None).unwrap();
        let mut plain = AudioToHannGrains::new(&audio, layout, 40, 1, 0.0).unwrap();
        let mut delayed = AudioToHannGrains::new(&audio, layout, 43, 1, 3.0).unwrap();
        assert_eq!(plain.next_grain().unwrap(), delayed.next_grain().unwrap());
    }

    #[test]
    fn test_rejects_non_finite_delay() {
        let audio = [0.0; 16];
        let layout = GrainLayout::new(Some(8), Some(4), None).unwrap();
        assert!(AudioToHannGrains::new(&audio, layout, 0, 1, f64::NAN).is_err());
    }
    #[test]
    fn test_rejects_out_of_range_delay() {
        let audio = [1.0; 16];
        let layout = GrainLayout::new(Some(8), Some(4), None).unwrap();
        for delay in [1e300, -1e300, 1e17] {
            assert!(matches!(
                AudioToHannGrains::new(&audio, layout, 0, 1, delay),
                Err(StemSubError::InvalidParameter { .. })
            ));
        }
        assert!(AudioToHannGrains::new(&audio, layout, i64::MIN + 2, 1, 8.0).is_err());
        assert!(AudioToHannGrains::new(&audio, layout, 0, 1, 1e9).is_ok());
    }
}
