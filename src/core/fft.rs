//! Forward and inverse transforms between real grains and complex spectra.

use std::sync::Arc;

use rustfft::{Fft, FftPlanner};

use crate::core::types::{Bin, Sample, BIN_ZERO};

/// Planned FFT pair for one grain length, with reusable scratch.
///
/// Spectra are full complex transforms (not half spectra), so their length
/// equals the grain length. The inverse is normalized by `1 / len` and keeps
/// only the real part.
pub struct SpectrumTransform {
    len: usize,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
    /// Reusable work buffer for the inverse transform.
    buffer: Vec<Bin>,
    /// Reusable FFT scratch, sized for either direction.
    scratch: Vec<Bin>,
}

impl std::fmt::Debug for SpectrumTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectrumTransform")
            .field("len", &self.len)
            .finish()
    }
}

impl SpectrumTransform {
    /// Plans both directions for grains of `len` samples.
    pub fn new(len: usize) -> Self {
        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(len);
        let inverse = planner.plan_fft_inverse(len);
        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());
        Self {
            len,
            forward,
            inverse,
            buffer: vec![BIN_ZERO; len],
            scratch: vec![BIN_ZERO; scratch_len],
        }
    }

    /// Grain and spectrum length.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Transforms `grain` into `spectrum`, overwriting it.
    pub fn forward(&mut self, grain: &[Sample], spectrum: &mut [Bin]) {
        assert_eq!(grain.len(), self.len, "grain length");
        assert_eq!(spectrum.len(), self.len, "spectrum length");
        for (bin, &s) in spectrum.iter_mut().zip(grain) {
            *bin = Bin::new(s, 0.0);
        }
        self.forward
            .process_with_scratch(spectrum, &mut self.scratch);
    }

    /// Allocating variant of [`forward`](Self::forward).
    pub fn forward_to_vec(&mut self, grain: &[Sample]) -> Vec<Bin> {
        let mut spectrum = vec![BIN_ZERO; self.len];
        self.forward(grain, &mut spectrum);
        spectrum
    }

    /// Transforms `spectrum` back into a real `grain`, leaving `spectrum`
    /// untouched.
    pub fn inverse(&mut self, spectrum: &[Bin], grain: &mut [Sample]) {
        assert_eq!(spectrum.len(), self.len, "spectrum length");
        assert_eq!(grain.len(), self.len, "grain length");
        self.buffer.copy_from_slice(spectrum);
        self.inverse
            .process_with_scratch(&mut self.buffer, &mut self.scratch);
        let norm = 1.0 / self.len as f64;
        for (s, bin) in grain.iter_mut().zip(&self.buffer) {
            *s = bin.re * norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_of_impulse_is_flat() {
        let mut t = SpectrumTransform::new(8);
        let mut grain = vec![0.0; 8];
        grain[0] = 1.0;
        let spectrum = t.forward_to_vec(&grain);
        for bin in &spectrum {
            assert!((bin - Bin::new(1.0, 0.0)).norm() < 1e-12);
        }
    }

    #[test]
    fn test_inverse_recovers_grain() {
        let len = 30;
        let mut t = SpectrumTransform::new(len);
        let grain: Vec<Sample> = (0..len).map(|i| ((i * 7 % 11) as f64) - 5.0).collect();
        let spectrum = t.forward_to_vec(&grain);
        let mut back = vec![0.0; len];
        t.inverse(&spectrum, &mut back);
        for (a, b) in grain.iter().zip(&back) {
            assert!((a - b).abs() < 1e-10);
        }
    }

    #[test]
    fn test_real_grain_has_conjugate_symmetric_spectrum() {
        let len = 16;
        let mut t = SpectrumTransform::new(len);
        let grain: Vec<Sample> = (0..len).map(|i| (i as f64 * 0.37).sin()).collect();
        let spectrum = t.forward_to_vec(&grain);
        for k in 1..len {
            assert!((spectrum[k] - spectrum[len - k].conj()).norm() < 1e-10);
        }
    }
}
