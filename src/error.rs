//! Error types for the stemsub crate.

use thiserror::Error;

/// Errors that can occur while configuring or running stem estimation.
///
/// Every variant except the I/O ones is a configuration error: it is raised
/// by a constructor or a `validate()` call, never from inside a step function.
/// Numerical degeneracy (near-zero denominators, excessive amplification) is
/// handled by [`SafeDivider`](crate::core::divide::SafeDivider) and is never an
/// error.
#[derive(Error, Debug)]
pub enum StemSubError {
    /// A parameter has a value outside its valid range.
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// A length is not evenly divisible by another.
    #[error("'{name}' ({value}) is not divisible by '{divisor_name}' ({divisor})")]
    NotDivisible {
        name: &'static str,
        value: usize,
        divisor_name: &'static str,
        divisor: usize,
    },

    /// Mutually exclusive parameters were both given, or neither was.
    #[error("conflicting parameters: {0}")]
    ConflictingParameters(String),

    /// A caller-supplied buffer has the wrong length.
    #[error("'{name}' should have length {expected}, got {actual}")]
    ShapeMismatch {
        name: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Sample rate is zero.
    #[error("invalid sample rate: {0}")]
    InvalidSampleRate(u32),

    /// Input too short for the given parameters.
    #[error("input too short: {provided} samples provided, {minimum} required")]
    InputTooShort { provided: usize, minimum: usize },

    /// A timestamp string could not be parsed.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Invalid audio file or config file contents.
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for stemsub operations.
pub type Result<T> = std::result::Result<T, StemSubError>;

impl StemSubError {
    /// Shorthand for [`StemSubError::InvalidParameter`].
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        StemSubError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// Checks that a caller-supplied buffer has the expected length.
pub(crate) fn check_len(name: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(StemSubError::ShapeMismatch {
            name,
            expected,
            actual,
        });
    }
    Ok(())
}

/// Checks that a floating point parameter is finite and strictly positive.
pub(crate) fn check_positive(name: &'static str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(StemSubError::invalid(
            name,
            format!("must be finite and greater than 0, got {}", value),
        ));
    }
    Ok(())
}
