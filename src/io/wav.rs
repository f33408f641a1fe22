//! Mono WAV loading and saving.

use std::path::Path;

use crate::core::types::{Sample, Signal};
use crate::error::{Result, StemSubError};

fn wav_error(path: &Path, e: hound::Error) -> StemSubError {
    match e {
        hound::Error::IoError(io) => StemSubError::Io(io),
        other => StemSubError::InvalidFormat(format!("{}: {}", path.display(), other)),
    }
}

/// Loads a WAV file as a mono signal.
///
/// Integer samples are scaled to `[-1, 1)`. Multi-channel files are mixed
/// down by averaging the channels of each frame.
pub fn load_mono_wav(path: &Path) -> Result<Signal> {
    let reader = hound::WavReader::open(path).map_err(|e| wav_error(path, e))?;
    let spec = reader.spec();
    let num_channels = spec.channels as usize;
    if num_channels == 0 {
        return Err(StemSubError::InvalidFormat(format!(
            "{}: no channels",
            path.display()
        )));
    }

    let interleaved: Vec<Sample> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .map(|s| s.map(|v| v as Sample))
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| wav_error(path, e))?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.max(1) - 1)) as Sample;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as Sample / scale))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| wav_error(path, e))?
        }
    };

    let data = if num_channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks_exact(num_channels)
            .map(|frame| frame.iter().sum::<Sample>() / num_channels as Sample)
            .collect()
    };
    log::debug!(
        "loaded {}: {} frames, {} channel(s), {} Hz",
        path.display(),
        data.len(),
        num_channels,
        spec.sample_rate
    );
    Signal::new(data, spec.sample_rate)
}

/// Saves a signal as a mono 32-bit float WAV file.
///
/// Samples are written unclipped; a residual can legitimately exceed full
/// scale.
pub fn save_mono_wav(path: &Path, signal: &Signal) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: signal.sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec).map_err(|e| wav_error(path, e))?;
    for &s in &signal.data {
        writer
            .write_sample(s as f32)
            .map_err(|e| wav_error(path, e))?;
    }
    writer.finalize().map_err(|e| wav_error(path, e))?;
    log::debug!("wrote {} ({} samples)", path.display(), signal.len());
    Ok(())
}
