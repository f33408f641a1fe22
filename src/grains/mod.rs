//! Framing signals into overlapping grains and overlap-adding them back.

pub mod framer;
pub mod overlap_add;
pub mod ranges;

pub use framer::{AudioToGrains, AudioToHannGrains};
pub use overlap_add::{AddGrainsToAudio, OverlapMode};
pub use ranges::{grains_to_cover, GrainPhase, GrainRanges};
