//! Guarded spectral division and the co-rotation primitive.

use crate::core::types::{Bin, BIN_ZERO};
use crate::error::{check_len, check_positive, Result};

/// Default cap on `|a / b|` before a bin counts as unstable.
pub const DEFAULT_MAX_ABS_RESULT: f64 = 10_000.0;

/// A value that can appear on either side of a spectral division.
pub trait DivideOperand: Copy {
    fn to_bin(self) -> Bin;
    fn magnitude(self) -> f64;
}

impl DivideOperand for f64 {
    #[inline]
    fn to_bin(self) -> Bin {
        Bin::new(self, 0.0)
    }

    #[inline]
    fn magnitude(self) -> f64 {
        self.abs()
    }
}

impl DivideOperand for Bin {
    #[inline]
    fn to_bin(self) -> Bin {
        self
    }

    #[inline]
    fn magnitude(self) -> f64 {
        self.norm()
    }
}

/// Rotates `b` by the angle that would turn `a` into `|a|`.
///
/// Returns `(|a|, b * e^(-i arg a))`. A zero `a` has angle 0, so `b` comes
/// back unchanged.
#[inline]
pub fn co_rotate<B: DivideOperand>(a: Bin, b: B) -> (f64, Bin) {
    let magnitude = a.norm();
    let b = b.to_bin();
    if magnitude == 0.0 {
        return (0.0, b);
    }
    (magnitude, b * (a.conj() / magnitude))
}

/// Fills every unsafe bin by linear interpolation between its nearest safe
/// neighbours.
///
/// Real and imaginary parts are interpolated independently. A leading run
/// of unsafe bins copies the first safe value and a trailing run copies the
/// last one. Returns `false`, leaving `values` untouched, when no bin is
/// safe.
pub fn interpolate_missing(values: &mut [Bin], is_safe: &[bool]) -> bool {
    debug_assert_eq!(values.len(), is_safe.len());
    let Some(first) = is_safe.iter().position(|&s| s) else {
        return false;
    };

    let first_value = values[first];
    values[..first].fill(first_value);

    let mut last = first;
    for i in first + 1..values.len() {
        if !is_safe[i] {
            continue;
        }
        let gap = i - last;
        if gap > 1 {
            let (from, to) = (values[last], values[i]);
            for j in 1..gap {
                let t = j as f64 / gap as f64;
                values[last + j] = from * (1.0 - t) + to * t;
            }
        }
        last = i;
    }

    let last_value = values[last];
    values[last + 1..].fill(last_value);
    true
}

/// Elementwise `a / b` that never amplifies past `max_abs_result`.
///
/// A bin is safe when `b` is non-zero, `|a| <= max_abs_result * |b|`, and the
/// quotient is finite. Unsafe bins are interpolated from safe ones; if no bin
/// is safe the result is all zeros. Never fails once constructed.
#[derive(Debug, Clone)]
pub struct SafeDivider {
    max_abs_result: f64,
    is_safe: Vec<bool>,
}

impl SafeDivider {
    /// Creates a divider for spectra of `len` bins.
    pub fn new(max_abs_result: f64, len: usize) -> Result<Self> {
        check_positive("max_abs_result", max_abs_result)?;
        Ok(Self {
            max_abs_result,
            is_safe: vec![false; len],
        })
    }

    #[inline]
    pub fn max_abs_result(&self) -> f64 {
        self.max_abs_result
    }

    /// Writes the guarded quotient `a / b` into `out`.
    ///
    /// All three slices must have the length given at construction.
    pub fn divide<A: DivideOperand, B: DivideOperand>(&mut self, a: &[A], b: &[B], out: &mut [Bin]) {
        assert!(
            a.len() == self.is_safe.len()
                && b.len() == self.is_safe.len()
                && out.len() == self.is_safe.len(),
            "divider operands must match the configured length"
        );

        for (((&a, &b), o), safe) in a
            .iter()
            .zip(b)
            .zip(out.iter_mut())
            .zip(self.is_safe.iter_mut())
        {
            let b_abs = b.magnitude();
            *safe = false;
            if b_abs != 0.0 && a.magnitude() <= self.max_abs_result * b_abs {
                let q = a.to_bin() / b.to_bin();
                if q.re.is_finite() && q.im.is_finite() {
                    *o = q;
                    *safe = true;
                    continue;
                }
            }
            *o = BIN_ZERO;
        }

        if !interpolate_missing(out, &self.is_safe) {
            out.fill(BIN_ZERO);
        }
    }
}

/// One-off guarded division returning a new spectrum.
pub fn safe_divide<A: DivideOperand, B: DivideOperand>(
    a: &[A],
    b: &[B],
    max_abs_result: f64,
) -> Result<Vec<Bin>> {
    check_len("b", a.len(), b.len())?;
    let mut divider = SafeDivider::new(max_abs_result, a.len())?;
    let mut out = vec![BIN_ZERO; a.len()];
    divider.divide(a, b, &mut out);
    Ok(out)
}
