//! Analysis windows and grain layout.
//!
//! Windows here are periodic and normalized so that `overlap` copies shifted
//! by multiples of the interval length sum to exactly 1. That makes framing
//! followed by overlap-add an identity, whatever the window shape.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::core::types::Sample;
use crate::error::{Result, StemSubError};

/// Default inner grain length in samples.
pub const DEFAULT_INNER_GRAIN_LEN: usize = 2048;
/// Default number of grains overlapping each sample.
pub const DEFAULT_OVERLAP: usize = 4;

/// Blackman-Harris window coefficients (4-term).
const BH_A0: f64 = 0.35875;
const BH_A1: f64 = 0.48829;
const BH_A2: f64 = 0.14128;
const BH_A3: f64 = 0.01168;

/// Window function types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WindowType {
    #[default]
    Hann,
    BlackmanHarris,
    Kaiser(u32), // beta parameter scaled by 100 (e.g., 800 = 8.0)
}

/// Resolved grain geometry.
///
/// `inner_grain_len == interval_len * overlap` always holds. The full grain is
/// the inner grain surrounded by `left_pad_len` and `right_pad_len` zeros.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrainLayout {
    inner_grain_len: usize,
    interval_len: usize,
    overlap: usize,
    left_pad_len: usize,
    right_pad_len: usize,
}

impl GrainLayout {
    /// Resolves the inner grain length, interval length and overlap count
    /// from whichever of them are given.
    ///
    /// Missing values are derived from the others; when too few are given the
    /// defaults fill in. Fails if the given values are inconsistent or the
    /// grain length is not divisible by the interval length.
    pub fn new(
        inner_grain_len: Option<usize>,
        interval_len: Option<usize>,
        overlap: Option<usize>,
    ) -> Result<Self> {
        for (name, value) in [
            ("inner_grain_len", inner_grain_len),
            ("interval_len", interval_len),
            ("overlap", overlap),
        ] {
            if value == Some(0) {
                return Err(StemSubError::invalid(name, "must be greater than 0"));
            }
        }

        let (inner_grain_len, interval_len, overlap) = match (inner_grain_len, interval_len, overlap)
        {
            (Some(g), Some(i), Some(o)) => {
                if g != i * o {
                    return Err(StemSubError::invalid(
                        "inner_grain_len",
                        format!("{} is not interval_len ({}) * overlap ({})", g, i, o),
                    ));
                }
                (g, i, o)
            }
            (None, Some(i), Some(o)) => (i * o, i, o),
            (Some(g), Some(i), None) => {
                if g % i != 0 {
                    return Err(StemSubError::NotDivisible {
                        name: "inner_grain_len",
                        value: g,
                        divisor_name: "interval_len",
                        divisor: i,
                    });
                }
                (g, i, g / i)
            }
            (g, None, o) => {
                let g = g.unwrap_or(DEFAULT_INNER_GRAIN_LEN);
                let o = o.unwrap_or(DEFAULT_OVERLAP);
                if g % o != 0 {
                    return Err(StemSubError::NotDivisible {
                        name: "inner_grain_len",
                        value: g,
                        divisor_name: "overlap",
                        divisor: o,
                    });
                }
                (g, g / o, o)
            }
            (None, Some(i), None) => {
                let g = DEFAULT_INNER_GRAIN_LEN;
                if g % i != 0 {
                    return Err(StemSubError::NotDivisible {
                        name: "inner_grain_len",
                        value: g,
                        divisor_name: "interval_len",
                        divisor: i,
                    });
                }
                (g, i, g / i)
            }
        };

        if overlap < 2 {
            return Err(StemSubError::invalid(
                "overlap",
                format!(
                    "grains must overlap at least twice (inner_grain_len {} / interval_len {})",
                    inner_grain_len, interval_len
                ),
            ));
        }

        Ok(Self {
            inner_grain_len,
            interval_len,
            overlap,
            left_pad_len: 0,
            right_pad_len: 0,
        })
    }

    /// Layout from an explicit grain length and interval length.
    pub fn from_grain_and_interval(inner_grain_len: usize, interval_len: usize) -> Result<Self> {
        Self::new(Some(inner_grain_len), Some(interval_len), None)
    }

    /// Adds zero padding around the inner grain.
    pub fn with_pads(mut self, left_pad_len: usize, right_pad_len: usize) -> Self {
        self.left_pad_len = left_pad_len;
        self.right_pad_len = right_pad_len;
        self
    }

    #[inline]
    pub fn inner_grain_len(&self) -> usize {
        self.inner_grain_len
    }

    #[inline]
    pub fn interval_len(&self) -> usize {
        self.interval_len
    }

    #[inline]
    pub fn overlap(&self) -> usize {
        self.overlap
    }

    #[inline]
    pub fn left_pad_len(&self) -> usize {
        self.left_pad_len
    }

    #[inline]
    pub fn right_pad_len(&self) -> usize {
        self.right_pad_len
    }

    /// Full grain length including pads; also the spectrum length.
    #[inline]
    pub fn grain_len(&self) -> usize {
        self.left_pad_len + self.inner_grain_len + self.right_pad_len
    }

    /// Inner window of `window_type`, shifted `delay_remainder` samples
    /// early and normalized for overlap-add at this layout's interval.
    pub fn inner_window(&self, window_type: WindowType, delay_remainder: f64) -> Vec<Sample> {
        let mut window = generate_window(window_type, self.inner_grain_len, delay_remainder);
        normalize_for_overlap(&mut window, self.interval_len);
        window
    }

    /// Full-length window with zeros in the pads.
    pub fn padded_window(&self, window_type: WindowType, delay_remainder: f64) -> Vec<Sample> {
        let mut window = vec![0.0; self.grain_len()];
        window[self.left_pad_len..self.left_pad_len + self.inner_grain_len]
            .copy_from_slice(&self.inner_window(window_type, delay_remainder));
        window
    }
}

/// Generates a periodic window of `size` samples evaluated at `i + shift`.
///
/// A fractional `shift` moves the taper earlier by that many samples.
pub fn generate_window(window_type: WindowType, size: usize, shift: f64) -> Vec<Sample> {
    match window_type {
        WindowType::Hann => hann_window(size, shift),
        WindowType::BlackmanHarris => blackman_harris_window(size, shift),
        WindowType::Kaiser(beta_100) => kaiser_window(size, beta_100 as f64 / 100.0, shift),
    }
}

/// Returns `Some(trivial_window)` for degenerate sizes (0 or 1), or `None`
/// to indicate the caller should compute the full window.
#[inline]
fn trivial_window(size: usize) -> Option<Vec<Sample>> {
    match size {
        0 => Some(vec![]),
        1 => Some(vec![1.0]),
        _ => None,
    }
}

/// Unnormalized periodic Hann window `1 - cos(2π(i + shift)/N)`.
#[inline]
fn hann_window(size: usize, shift: f64) -> Vec<Sample> {
    if let Some(w) = trivial_window(size) {
        return w;
    }
    let n = size as f64;
    (0..size)
        .map(|i| 1.0 - (2.0 * PI * (i as f64 + shift) / n).cos())
        .collect()
}

/// Periodic Blackman-Harris window.
#[inline]
fn blackman_harris_window(size: usize, shift: f64) -> Vec<Sample> {
    if let Some(w) = trivial_window(size) {
        return w;
    }
    let n = size as f64;
    (0..size)
        .map(|i| {
            let x = (i as f64 + shift) / n;
            BH_A0 - BH_A1 * (2.0 * PI * x).cos() + BH_A2 * (4.0 * PI * x).cos()
                - BH_A3 * (6.0 * PI * x).cos()
        })
        .collect()
}

/// Periodic Kaiser window using the zeroth-order modified Bessel function.
#[inline]
fn kaiser_window(size: usize, beta: f64, shift: f64) -> Vec<Sample> {
    if let Some(w) = trivial_window(size) {
        return w;
    }
    let n = size as f64;
    let denom = bessel_i0(beta);
    (0..size)
        .map(|i| {
            let x = 2.0 * (i as f64 + shift) / n - 1.0;
            let arg = beta * (1.0 - x * x).max(0.0).sqrt();
            bessel_i0(arg) / denom
        })
        .collect()
}

/// Maximum number of series terms for Bessel I0 convergence.
const BESSEL_MAX_TERMS: usize = 30;
/// Relative convergence threshold for Bessel I0 series.
const BESSEL_CONVERGENCE: f64 = 1e-15;

/// Zeroth-order modified Bessel function of the first kind.
/// Computed via series expansion.
#[inline]
fn bessel_i0(x: f64) -> f64 {
    let mut sum = 1.0;
    let mut term = 1.0;
    let x_half = x / 2.0;
    for k in 1..BESSEL_MAX_TERMS {
        term *= (x_half / k as f64) * (x_half / k as f64);
        sum += term;
        if term < BESSEL_CONVERGENCE * sum {
            break;
        }
    }
    sum
}

/// Scales `window` so that its copies shifted by multiples of
/// `interval_len` sum to 1 at every position.
///
/// `window.len()` must be a multiple of `interval_len`; positions whose
/// shifted sum is zero are left at zero.
pub fn normalize_for_overlap(window: &mut [Sample], interval_len: usize) {
    if interval_len == 0 || window.is_empty() {
        return;
    }
    let mut scale = vec![0.0; interval_len];
    for segment in window.chunks(interval_len) {
        for (s, &w) in scale.iter_mut().zip(segment) {
            *s += w;
        }
    }
    for s in scale.iter_mut() {
        *s = if *s != 0.0 { 1.0 / *s } else { 0.0 };
    }
    for segment in window.chunks_mut(interval_len) {
        for (w, &s) in segment.iter_mut().zip(&scale) {
            *w *= s;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overlap_sum(window: &[Sample], interval_len: usize) -> Vec<Sample> {
        let mut sum = vec![0.0; interval_len];
        for segment in window.chunks(interval_len) {
            for (s, &w) in sum.iter_mut().zip(segment) {
                *s += w;
            }
        }
        sum
    }

    #[test]
    fn test_layout_resolution() {
        let l = GrainLayout::new(Some(999), Some(111), None).unwrap();
        assert_eq!((l.inner_grain_len(), l.interval_len(), l.overlap()), (999, 111, 9));

        let l = GrainLayout::new(Some(1024), None, Some(4)).unwrap();
        assert_eq!(l.interval_len(), 256);

        let l = GrainLayout::new(None, Some(100), Some(3)).unwrap();
        assert_eq!(l.inner_grain_len(), 300);

        let l = GrainLayout::new(None, None, None).unwrap();
        assert_eq!(l.inner_grain_len(), DEFAULT_INNER_GRAIN_LEN);
        assert_eq!(l.overlap(), DEFAULT_OVERLAP);
    }

    #[test]
    fn test_layout_rejects_non_divisible() {
        assert!(matches!(
            GrainLayout::new(Some(1000), Some(3), None),
            Err(StemSubError::NotDivisible {
                name: "inner_grain_len",
                divisor_name: "interval_len",
                ..
            })
        ));
        assert!(matches!(
            GrainLayout::new(Some(1000), None, Some(3)),
            Err(StemSubError::NotDivisible {
                divisor_name: "overlap",
                ..
            })
        ));
        assert!(GrainLayout::new(Some(1000), Some(100), Some(3)).is_err());
    }

    #[test]
    fn test_layout_rejects_zero_and_single_overlap() {
        assert!(GrainLayout::new(Some(0), None, None).is_err());
        assert!(GrainLayout::new(Some(64), Some(0), None).is_err());
        assert!(GrainLayout::new(Some(64), Some(64), None).is_err());
    }

    #[test]
    fn test_padded_grain_len() {
        let l = GrainLayout::new(Some(64), Some(16), None)
            .unwrap()
            .with_pads(8, 4);
        assert_eq!(l.grain_len(), 76);
        let w = l.padded_window(WindowType::Hann, 0.0);
        assert_eq!(w.len(), 76);
        assert!(w[..8].iter().all(|&x| x == 0.0));
        assert!(w[72..].iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_normalized_windows_sum_to_one() {
        let layout = GrainLayout::new(Some(999), Some(111), None).unwrap();
        for window_type in [
            WindowType::Hann,
            WindowType::BlackmanHarris,
            WindowType::Kaiser(800),
        ] {
            for shift in [0.0, 0.3, 0.7] {
                let w = layout.inner_window(window_type, shift);
                for s in overlap_sum(&w, 111) {
                    assert!((s - 1.0).abs() < 1e-12, "{:?} shift {}", window_type, shift);
                }
            }
        }
    }

    #[test]
    fn test_hann_window_shape() {
        let w = hann_window(1024, 0.0);
        assert_eq!(w.len(), 1024);
        assert!(w[0].abs() < 1e-12);
        assert!((w[512] - 2.0).abs() < 1e-12);
        // Periodic: symmetric around the centre sample
        for i in 1..512 {
            assert!((w[i] - w[1024 - i]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_shift_moves_taper_earlier() {
        let w0 = hann_window(64, 0.0);
        let w1 = hann_window(64, 1.0);
        for i in 0..63 {
            assert!((w1[i] - w0[i + 1]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_empty_and_single_sample_windows() {
        assert!(generate_window(WindowType::Hann, 0, 0.0).is_empty());
        assert_eq!(generate_window(WindowType::BlackmanHarris, 1, 0.5), vec![1.0]);
        assert_eq!(generate_window(WindowType::Kaiser(800), 1, 0.0), vec![1.0]);
    }
}
