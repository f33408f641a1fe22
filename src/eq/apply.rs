//! Applying an EQ profile to spectra.

use crate::core::ring_buffer::SpectrumSource;
use crate::core::types::{Bin, BIN_ZERO};

/// Writes `eq_profile * spectrum` bin by bin into `out`.
#[inline]
pub fn apply_eq_profile(eq_profile: &[Bin], spectrum: &[Bin], out: &mut [Bin]) {
    debug_assert!(eq_profile.len() == spectrum.len() && spectrum.len() == out.len());
    for ((o, &e), &s) in out.iter_mut().zip(eq_profile).zip(spectrum) {
        *o = e * s;
    }
}

/// Filters the oldest spectrum of a history with an EQ profile.
///
/// With a delayed stem history this applies an estimate built from later
/// frames to an earlier stem frame.
#[derive(Debug, Clone)]
pub struct ApplyEqProfileToOldest {
    out: Vec<Bin>,
}

impl ApplyEqProfileToOldest {
    pub fn new(len: usize) -> Self {
        Self {
            out: vec![BIN_ZERO; len],
        }
    }

    /// Filters `spectra`'s oldest spectrum and returns the result.
    pub fn apply<S>(&mut self, eq_profile: &[Bin], spectra: &S) -> &[Bin]
    where
        S: SpectrumSource + ?Sized,
    {
        apply_eq_profile(eq_profile, spectra.oldest_spectrum(), &mut self.out);
        &self.out
    }

    pub fn output(&self) -> &[Bin] {
        &self.out
    }
}
