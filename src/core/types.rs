use rustfft::num_complex::Complex;

use crate::error::{Result, StemSubError};

/// A single audio sample.
///
/// Double precision keeps long cumulative spectral sums accurate.
pub type Sample = f64;

/// One complex frequency bin.
pub type Bin = Complex<f64>;

/// Zero-valued bin, used for buffer initialization.
pub const BIN_ZERO: Bin = Complex::new(0.0, 0.0);

/// Complex spectrum of one grain; its length equals the grain length.
pub type Spectrum = Vec<Bin>;

/// Per-bin complex gain mapping a stem spectrum onto its contribution in
/// the mix.
pub type EqProfile = Vec<Bin>;

/// A single-channel recording.
///
/// Samples outside `0..len()` are defined as zero whenever a grain reaches
/// past either end.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    /// Raw samples.
    pub data: Vec<Sample>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

impl Signal {
    /// Create a new signal.
    ///
    /// # Errors
    /// Returns `StemSubError::InvalidSampleRate` if `sample_rate` is 0.
    pub fn new(data: Vec<Sample>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(StemSubError::InvalidSampleRate(sample_rate));
        }
        Ok(Self { data, sample_rate })
    }

    /// Number of samples.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the signal contains no samples.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.data.len() as f64 / self.sample_rate as f64
    }

    /// Converts a duration in seconds to (fractional) samples at this rate.
    #[inline]
    pub fn seconds_to_samples(&self, seconds: f64) -> f64 {
        seconds * self.sample_rate as f64
    }
}

impl AsRef<[Sample]> for Signal {
    fn as_ref(&self) -> &[Sample] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_rejects_zero_rate() {
        assert!(matches!(
            Signal::new(vec![0.0; 4], 0),
            Err(StemSubError::InvalidSampleRate(0))
        ));
    }

    #[test]
    fn test_duration() {
        let s = Signal::new(vec![0.0; 24000], 48000).unwrap();
        assert!((s.duration_secs() - 0.5).abs() < 1e-12);
        assert!((s.seconds_to_samples(0.25) - 12000.0).abs() < 1e-9);
    }
}
