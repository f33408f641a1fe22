//! Configuration records for framing, EQ estimation and delay search.
//!
//! All records serialize to JSON, and every field has a default so partial
//! files are accepted. Nothing is validated lazily: constructors that consume
//! a record call its `validate()` first.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::divide::DEFAULT_MAX_ABS_RESULT;
use crate::core::window::{GrainLayout, WindowType, DEFAULT_INNER_GRAIN_LEN};
use crate::error::{check_positive, Result, StemSubError};

/// Default number of past frames in the streaming EQ window.
pub const DEFAULT_LOOKBEHIND: usize = 64;
/// Default number of frames the running EQ window reaches ahead of the
/// stem grain it is applied to.
pub const DEFAULT_LOOKAHEAD: usize = 32;
/// Default number of grain pairs scored per delay guess.
pub const DEFAULT_ITERATIONS_PER_GUESS: usize = 64;
/// Default second delay guess offset, in samples.
pub const DEFAULT_FIRST_GUESS_ADD: f64 = 1.0;
/// Default delay search tolerance, in samples.
pub const DEFAULT_MIN_GUESS_DIFF: f64 = 1e-3;
/// Default outward extrapolation factor for the delay search.
pub const DEFAULT_SIDE_WINNER_MUL: f64 = 3.0;
/// Upper bound on delay search steps.
pub const DEFAULT_MAX_SEARCH_ITERATIONS: usize = 200;

/// Grain geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrainConfig {
    pub inner_grain_len: usize,
    /// Hop between grains; derived from `overlap` when absent.
    pub interval_len: Option<usize>,
    /// Grains per sample; derived from `interval_len` when absent.
    pub overlap: Option<usize>,
    pub left_pad_len: usize,
    pub right_pad_len: usize,
    pub window: WindowType,
}

impl Default for GrainConfig {
    fn default() -> Self {
        Self {
            inner_grain_len: DEFAULT_INNER_GRAIN_LEN,
            interval_len: None,
            overlap: None,
            left_pad_len: 0,
            right_pad_len: 0,
            window: WindowType::Hann,
        }
    }
}

impl GrainConfig {
    pub fn with_inner_grain_len(mut self, inner_grain_len: usize) -> Self {
        self.inner_grain_len = inner_grain_len;
        self
    }

    pub fn with_interval_len(mut self, interval_len: usize) -> Self {
        self.interval_len = Some(interval_len);
        self.overlap = None;
        self
    }

    pub fn with_overlap(mut self, overlap: usize) -> Self {
        self.overlap = Some(overlap);
        self.interval_len = None;
        self
    }

    /// Same zero padding on both sides.
    pub fn with_pad_len(mut self, pad_len: usize) -> Self {
        self.left_pad_len = pad_len;
        self.right_pad_len = pad_len;
        self
    }

    pub fn with_pads(mut self, left_pad_len: usize, right_pad_len: usize) -> Self {
        self.left_pad_len = left_pad_len;
        self.right_pad_len = right_pad_len;
        self
    }

    pub fn with_window(mut self, window: WindowType) -> Self {
        self.window = window;
        self
    }

    /// Resolves the geometry.
    pub fn layout(&self) -> Result<GrainLayout> {
        Ok(
            GrainLayout::new(Some(self.inner_grain_len), self.interval_len, self.overlap)?
                .with_pads(self.left_pad_len, self.right_pad_len),
        )
    }

    pub fn validate(&self) -> Result<()> {
        self.layout().map(|_| ())
    }
}

/// Spectral EQ estimation settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EqConfig {
    /// Largest per-bin gain accepted before a bin is interpolated instead.
    pub max_abs_result: f64,
    /// Past frames in the streaming window (window holds `lookbehind + 1`).
    pub lookbehind: usize,
    /// How many frames of the streaming window lie after the stem grain the
    /// estimate is applied to.
    pub lookahead: usize,
    /// Estimate mix-to-stem instead of stem-to-mix.
    pub reciprocal: bool,
}

impl Default for EqConfig {
    fn default() -> Self {
        Self {
            max_abs_result: DEFAULT_MAX_ABS_RESULT,
            lookbehind: DEFAULT_LOOKBEHIND,
            lookahead: DEFAULT_LOOKAHEAD,
            reciprocal: false,
        }
    }
}

impl EqConfig {
    pub fn with_max_abs_result(mut self, max_abs_result: f64) -> Self {
        self.max_abs_result = max_abs_result;
        self
    }

    pub fn with_window(mut self, lookbehind: usize, lookahead: usize) -> Self {
        self.lookbehind = lookbehind;
        self.lookahead = lookahead;
        self
    }

    pub fn with_reciprocal(mut self, reciprocal: bool) -> Self {
        self.reciprocal = reciprocal;
        self
    }

    pub fn validate(&self) -> Result<()> {
        check_positive("max_abs_result", self.max_abs_result)?;
        if self.lookahead > self.lookbehind {
            return Err(StemSubError::invalid(
                "lookahead",
                format!(
                    "must not exceed lookbehind ({}), got {}",
                    self.lookbehind, self.lookahead
                ),
            ));
        }
        Ok(())
    }
}

/// Fractional delay search settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DelaySearchConfig {
    /// Signal offset of the first inner grain scored.
    pub start_i: i64,
    /// Grain pairs accumulated per scored guess.
    pub num_of_iterations_per_guess: usize,
    /// First delay tried, in samples.
    pub first_guess: f64,
    /// Offset of the second delay tried.
    pub first_guess_add: f64,
    /// Search stops once the bracket is narrower than this.
    pub min_guess_diff: f64,
    /// Outward extrapolation factor while the best guess is on an edge.
    pub side_winner_mul: f64,
    /// Hard cap on search steps.
    pub max_iterations: usize,
}

impl Default for DelaySearchConfig {
    fn default() -> Self {
        Self {
            start_i: 0,
            num_of_iterations_per_guess: DEFAULT_ITERATIONS_PER_GUESS,
            first_guess: 0.0,
            first_guess_add: DEFAULT_FIRST_GUESS_ADD,
            min_guess_diff: DEFAULT_MIN_GUESS_DIFF,
            side_winner_mul: DEFAULT_SIDE_WINNER_MUL,
            max_iterations: DEFAULT_MAX_SEARCH_ITERATIONS,
        }
    }
}

impl DelaySearchConfig {
    pub fn with_start_i(mut self, start_i: i64) -> Self {
        self.start_i = start_i;
        self
    }

    pub fn with_iterations_per_guess(mut self, n: usize) -> Self {
        self.num_of_iterations_per_guess = n;
        self
    }

    pub fn with_first_guess(mut self, first_guess: f64, first_guess_add: f64) -> Self {
        self.first_guess = first_guess;
        self.first_guess_add = first_guess_add;
        self
    }

    pub fn with_min_guess_diff(mut self, min_guess_diff: f64) -> Self {
        self.min_guess_diff = min_guess_diff;
        self
    }

    /// Scores the inner grains that fit entirely inside `start..stop`.
    pub fn with_span(mut self, start: usize, stop: usize, layout: &GrainLayout) -> Result<Self> {
        let span = stop.saturating_sub(start);
        if span < layout.inner_grain_len() {
            return Err(StemSubError::InputTooShort {
                provided: span,
                minimum: layout.inner_grain_len(),
            });
        }
        self.start_i = start as i64;
        self.num_of_iterations_per_guess =
            (span - layout.inner_grain_len()) / layout.interval_len() + 1;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_of_iterations_per_guess == 0 {
            return Err(StemSubError::invalid(
                "num_of_iterations_per_guess",
                "must be greater than 0",
            ));
        }
        if !self.first_guess.is_finite() {
            return Err(StemSubError::invalid("first_guess", "must be finite"));
        }
        if !self.first_guess_add.is_finite() || self.first_guess_add == 0.0 {
            return Err(StemSubError::invalid(
                "first_guess_add",
                format!("must be finite and non-zero, got {}", self.first_guess_add),
            ));
        }
        check_positive("min_guess_diff", self.min_guess_diff)?;
        check_positive("side_winner_mul", self.side_winner_mul)?;
        if self.max_iterations == 0 {
            return Err(StemSubError::invalid("max_iterations", "must be greater than 0"));
        }
        Ok(())
    }
}

/// Whole-pipeline settings, as read from a JSON config file.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SubtractConfig {
    pub grain: GrainConfig,
    pub eq: EqConfig,
    pub delay_search: DelaySearchConfig,
    /// Use the streaming EQ estimate instead of one whole-span estimate.
    pub running: bool,
}

impl SubtractConfig {
    pub fn validate(&self) -> Result<()> {
        self.grain.validate()?;
        self.eq.validate()?;
        self.delay_search.validate()
    }
}

/// Writes a configuration as pretty-printed JSON.
pub fn write_config_json(path: &Path, config: &SubtractConfig) -> Result<()> {
    let json = serde_json::to_string_pretty(config).map_err(|e| {
        StemSubError::InvalidFormat(format!("failed to serialize config: {}", e))
    })?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Reads and validates a configuration from JSON.
pub fn read_config_json(path: &Path) -> Result<SubtractConfig> {
    let data = std::fs::read_to_string(path)?;
    let config: SubtractConfig = serde_json::from_str(&data).map_err(|e| {
        StemSubError::InvalidFormat(format!(
            "failed to parse config from {}: {}",
            path.display(),
            e
        ))
    })?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SubtractConfig::default();
        assert!(config.validate().is_ok());
        let layout = config.grain.layout().unwrap();
        assert_eq!(layout.inner_grain_len(), 2048);
        assert_eq!(layout.interval_len(), 512);
        assert_eq!(config.eq.lookbehind, 64);
        assert_eq!(config.eq.lookahead, 32);
    }

    #[test]
    fn test_grain_config_builders() {
        let g = GrainConfig::default()
            .with_inner_grain_len(999)
            .with_interval_len(111)
            .with_pad_len(10);
        let layout = g.layout().unwrap();
        assert_eq!(layout.overlap(), 9);
        assert_eq!(layout.grain_len(), 1019);

        let g = GrainConfig::default().with_inner_grain_len(1000).with_overlap(3);
        assert!(matches!(g.validate(), Err(StemSubError::NotDivisible { .. })));
    }

    #[test]
    fn test_eq_config_validation() {
        assert!(EqConfig::default().with_max_abs_result(0.0).validate().is_err());
        assert!(EqConfig::default().with_window(4, 5).validate().is_err());
        assert!(EqConfig::default().with_window(4, 4).validate().is_ok());
    }

    #[test]
    fn test_delay_search_validation() {
        assert!(DelaySearchConfig::default()
            .with_min_guess_diff(0.0)
            .validate()
            .is_err());
        assert!(DelaySearchConfig::default()
            .with_first_guess(0.0, 0.0)
            .validate()
            .is_err());
        assert!(DelaySearchConfig::default()
            .with_iterations_per_guess(0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_search_span() {
        let layout = GrainConfig::default()
            .with_inner_grain_len(16)
            .with_interval_len(4)
            .layout()
            .unwrap();
        let search = DelaySearchConfig::default().with_span(100, 140, &layout).unwrap();
        assert_eq!(search.start_i, 100);
        assert_eq!(search.num_of_iterations_per_guess, 7);
        assert!(DelaySearchConfig::default().with_span(100, 110, &layout).is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SubtractConfig =
            serde_json::from_str(r#"{"grain": {"inner_grain_len": 512}, "running": true}"#).unwrap();
        assert_eq!(config.grain.inner_grain_len, 512);
        assert!(config.running);
        assert_eq!(config.eq, EqConfig::default());
    }
}
