//! Core types, windows, transforms, and guarded division.

pub mod divide;
pub mod fft;
pub mod progress;
pub mod ring_buffer;
pub mod types;
pub mod window;

pub use divide::{co_rotate, safe_divide, SafeDivider};
pub use fft::SpectrumTransform;
pub use progress::{Logger, Progress, ProgressSink};
pub use ring_buffer::{RingBuffer, SpectrumSource};
pub use types::*;
pub use window::{GrainLayout, WindowType};
