//! Fractional delay search.

pub mod find_delay;
pub mod hone_in;

pub use find_delay::{find_delay_stem, seconds_to_samples, DelayEstimate, FindDelayStem};
pub use hone_in::{hone_in, Bracket, HoneIn, HoneInParams, Objective};
