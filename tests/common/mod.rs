#![allow(dead_code)]

use rand::{rngs::StdRng, Rng, SeedableRng};
use rustfft::{num_complex::Complex, FftPlanner};

pub const SAMPLE_RATE: u32 = 44100;

/// Uniform white noise in `[-0.5, 0.5)`.
pub fn noise(len: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.random::<f64>() - 0.5).collect()
}

pub fn scaled(signal: &[f64], gain: f64) -> Vec<f64> {
    signal.iter().map(|x| gain * x).collect()
}

pub fn add(a: &[f64], b: &[f64]) -> Vec<f64> {
    a.iter().zip(b).map(|(x, y)| x + y).collect()
}

/// Delays by a whole number of samples, zero filling the start.
pub fn delay_whole(signal: &[f64], delay: usize) -> Vec<f64> {
    let mut out = vec![0.0; signal.len()];
    if delay < signal.len() {
        out[delay..].copy_from_slice(&signal[..signal.len() - delay]);
    }
    out
}

/// Delays by a fractional number of samples with a linear phase ramp over
/// the whole signal (circular band-limited delay).
pub fn delay_fractional(signal: &[f64], delay: f64) -> Vec<f64> {
    let n = signal.len();
    let mut planner = FftPlanner::<f64>::new();
    let forward = planner.plan_fft_forward(n);
    let inverse = planner.plan_fft_inverse(n);

    let mut buf: Vec<Complex<f64>> = signal.iter().map(|&x| Complex::new(x, 0.0)).collect();
    forward.process(&mut buf);
    for (k, bin) in buf.iter_mut().enumerate() {
        let freq = if k <= n / 2 { k as f64 } else { k as f64 - n as f64 };
        let angle = -2.0 * std::f64::consts::PI * freq * delay / n as f64;
        *bin *= Complex::from_polar(1.0, angle);
    }
    inverse.process(&mut buf);
    buf.iter().map(|c| c.re / n as f64).collect()
}

pub fn rms(signal: &[f64]) -> f64 {
    if signal.is_empty() {
        return 0.0;
    }
    (signal.iter().map(|x| x * x).sum::<f64>() / signal.len() as f64).sqrt()
}

pub fn max_abs(signal: &[f64]) -> f64 {
    signal.iter().fold(0.0, |m, x| m.max(x.abs()))
}
