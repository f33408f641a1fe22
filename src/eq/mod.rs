//! Spectral EQ estimation between a stem and a mix.

pub mod apply;
pub mod audio_pair;
pub mod running;
pub mod single;

pub use apply::{apply_eq_profile, ApplyEqProfileToOldest};
pub use audio_pair::AudioPairToEqProfile;
pub use running::SpectraToEqProfiles;
pub use single::{estimate_eq_profile, SpectraToEqProfile};
