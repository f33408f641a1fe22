//! Audio file I/O.

pub mod wav;

pub use wav::{load_mono_wav, save_mono_wav};
