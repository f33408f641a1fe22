//! Whole-span EQ estimation.

use crate::config::EqConfig;
use crate::core::divide::{co_rotate, SafeDivider};
use crate::core::ring_buffer::SpectrumSource;
use crate::core::types::{Bin, BIN_ZERO};
use crate::error::{check_len, Result};

/// Accumulates stem/mix spectrum pairs and estimates the EQ profile mapping
/// stem onto mix over every frame seen.
///
/// Each frame contributes `|stem|` and the mix rotated by the stem's phase;
/// the estimate is their summed ratio, i.e. an amplitude-weighted average
/// response. Summing rotated values avoids the phase cancellation raw cross
/// spectra suffer from.
#[derive(Debug, Clone)]
pub struct SpectraToEqProfile {
    reciprocal: bool,
    abs_stem_sum: Vec<f64>,
    rotated_mix_sum: Vec<Bin>,
    divider: SafeDivider,
    out: Vec<Bin>,
    num_of_frames: usize,
}

impl SpectraToEqProfile {
    /// Creates an estimator for spectra of `len` bins.
    pub fn new(len: usize, max_abs_result: f64, reciprocal: bool) -> Result<Self> {
        Ok(Self {
            reciprocal,
            abs_stem_sum: vec![0.0; len],
            rotated_mix_sum: vec![BIN_ZERO; len],
            divider: SafeDivider::new(max_abs_result, len)?,
            out: vec![BIN_ZERO; len],
            num_of_frames: 0,
        })
    }

    pub fn from_config(len: usize, config: &EqConfig) -> Result<Self> {
        config.validate()?;
        Self::new(len, config.max_abs_result, config.reciprocal)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.out.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.out.is_empty()
    }

    /// Frames accumulated so far.
    #[inline]
    pub fn num_of_frames(&self) -> usize {
        self.num_of_frames
    }

    /// Adds one frame.
    ///
    /// # Panics
    /// If either spectrum does not have the configured length.
    pub fn add_frame(&mut self, stem: &[Bin], mix: &[Bin]) {
        assert!(
            stem.len() == self.len() && mix.len() == self.len(),
            "spectra must match the estimator length"
        );
        for (((&s, &m), abs_sum), rot_sum) in stem
            .iter()
            .zip(mix)
            .zip(self.abs_stem_sum.iter_mut())
            .zip(self.rotated_mix_sum.iter_mut())
        {
            let (abs_stem, rotated_mix) = co_rotate(s, m);
            *abs_sum += abs_stem;
            *rot_sum += rotated_mix;
        }
        self.num_of_frames += 1;
    }

    /// Adds the newest spectrum of each source.
    #[inline]
    pub fn step<S, M>(&mut self, stem: &S, mix: &M)
    where
        S: SpectrumSource + ?Sized,
        M: SpectrumSource + ?Sized,
    {
        self.add_frame(stem.newest_spectrum(), mix.newest_spectrum());
    }

    /// Computes the estimate from all frames so far.
    ///
    /// Bins where the division is unstable are interpolated; with no frames
    /// the profile is all zeros.
    pub fn calculate_eq_profile(&mut self) -> &[Bin] {
        if self.reciprocal {
            self.divider
                .divide(&self.abs_stem_sum, &self.rotated_mix_sum, &mut self.out);
        } else {
            self.divider
                .divide(&self.rotated_mix_sum, &self.abs_stem_sum, &mut self.out);
        }
        &self.out
    }

    /// The last computed profile.
    pub fn eq_profile(&self) -> &[Bin] {
        &self.out
    }

    /// Forgets every frame.
    pub fn reset(&mut self) {
        self.abs_stem_sum.fill(0.0);
        self.rotated_mix_sum.fill(BIN_ZERO);
        self.num_of_frames = 0;
    }
}

/// Estimates the profile over a list of frame pairs in one call.
pub fn estimate_eq_profile(
    stem_spectra: &[Vec<Bin>],
    mix_spectra: &[Vec<Bin>],
    config: &EqConfig,
) -> Result<Vec<Bin>> {
    check_len("mix_spectra", stem_spectra.len(), mix_spectra.len())?;
    let len = stem_spectra.first().map_or(0, Vec::len);
    let mut estimator = SpectraToEqProfile::from_config(len, config)?;
    for (stem, mix) in stem_spectra.iter().zip(mix_spectra) {
        check_len("stem spectrum", len, stem.len())?;
        check_len("mix spectrum", len, mix.len())?;
        estimator.add_frame(stem, mix);
    }
    Ok(estimator.calculate_eq_profile().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ring_buffer::RingBuffer;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn random_spectrum(rng: &mut StdRng, len: usize) -> Vec<Bin> {
        (0..len)
            .map(|_| Bin::new(rng.random::<f64>(), rng.random::<f64>()))
            .collect()
    }

    #[test]
    fn test_recovers_known_profile() {
        let mut rng = StdRng::seed_from_u64(7);
        let eq = random_spectrum(&mut rng, 100);
        let mut estimator = SpectraToEqProfile::new(100, 1e4, false).unwrap();
        let mut last = (vec![], vec![]);
        for _ in 0..10 {
            let stem = random_spectrum(&mut rng, 100);
            let mix: Vec<Bin> = stem.iter().zip(&eq).map(|(s, e)| s * e).collect();
            estimator.add_frame(&stem, &mix);
            last = (stem, mix);
        }
        assert_eq!(estimator.num_of_frames(), 10);
        let result = estimator.calculate_eq_profile().to_vec();
        for (r, e) in result.iter().zip(&eq) {
            assert!((r - e).norm() < 1e-6);
        }
        let (stem, mix) = last;
        for i in 0..100 {
            assert!((mix[i] - stem[i] * result[i]).norm() < 1e-6);
        }
    }

    #[test]
    fn test_reciprocal_inverts_profile() {
        let mut rng = StdRng::seed_from_u64(3);
        let eq: Vec<Bin> = random_spectrum(&mut rng, 32)
            .into_iter()
            .map(|e| e + Bin::new(0.5, 0.0))
            .collect();
        let mut estimator = SpectraToEqProfile::new(32, 1e4, true).unwrap();
        for _ in 0..5 {
            let stem = random_spectrum(&mut rng, 32);
            let mix: Vec<Bin> = stem.iter().zip(&eq).map(|(s, e)| s * e).collect();
            estimator.add_frame(&stem, &mix);
        }
        for (r, e) in estimator.calculate_eq_profile().iter().zip(&eq) {
            assert!((r * e - Bin::new(1.0, 0.0)).norm() < 1e-6);
        }
    }

    #[test]
    fn test_step_reads_newest_of_sources() {
        let stem = RingBuffer::single(vec![Bin::new(2.0, 0.0); 4]);
        let mix = RingBuffer::single(vec![Bin::new(0.0, 6.0); 4]);
        let mut estimator = SpectraToEqProfile::new(4, 100.0, false).unwrap();
        estimator.step(&stem, &mix);
        for r in estimator.calculate_eq_profile() {
            assert!((r - Bin::new(0.0, 3.0)).norm() < 1e-12);
        }
    }

    #[test]
    fn test_no_frames_gives_zeros_and_reset_clears() {
        let mut estimator = SpectraToEqProfile::new(8, 100.0, false).unwrap();
        assert!(estimator.calculate_eq_profile().iter().all(|&b| b == BIN_ZERO));
        estimator.add_frame(&[Bin::new(1.0, 0.0); 8], &[Bin::new(2.0, 0.0); 8]);
        estimator.reset();
        assert_eq!(estimator.num_of_frames(), 0);
        assert!(estimator.calculate_eq_profile().iter().all(|&b| b == BIN_ZERO));
    }

    #[test]
    fn test_estimate_eq_profile_checks_shapes() {
        let config = EqConfig::default();
        let stem = vec![vec![Bin::new(1.0, 0.0); 4]];
        let mix = vec![vec![Bin::new(3.0, 0.0); 4]];
        let eq = estimate_eq_profile(&stem, &mix, &config).unwrap();
        assert!((eq[0] - Bin::new(3.0, 0.0)).norm() < 1e-12);
        assert!(estimate_eq_profile(&stem, &[], &config).is_err());
        assert!(estimate_eq_profile(&stem, &[vec![BIN_ZERO; 3]], &config).is_err());
    }
}
