//! WAV file collaborator: reads a canonical RIFF/WAVE PCM file into the
//! mono Float32 `AudioBuffer` the rest of the receive chain consumes, and
//! offers an optional peak-normalization pass.

use std::path::Path;

use crate::dsp::AudioBuffer;
use crate::errors::{IoError, Result};

/// Before/after levels reported by [`normalize_peak`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizationReport {
    pub gain_applied: f32,
    pub pre_peak: f32,
    pub post_peak: f32,
    pub pre_rms: f32,
    pub post_rms: f32,
}

/// Reads a WAV file, downmixing multi-channel audio by averaging channels
/// and normalizing integer PCM sample widths to `f32` in `[-1, 1]`.
pub fn read_wav(path: impl AsRef<Path>) -> Result<AudioBuffer> {
    let path_ref = path.as_ref();
    let mut reader = hound::WavReader::open(path_ref).map_err(|e| IoError::WavRead {
        path: path_ref.display().to_string(),
        reason: e.to_string(),
    })?;

    let spec = reader.spec();
    let channels = spec.channels as usize;
    if channels == 0 {
        return Err(IoError::UnsupportedWavFormat {
            reason: "zero audio channels".to_string(),
        }
        .into());
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| IoError::WavRead {
                path: path_ref.display().to_string(),
                reason: e.to_string(),
            })?,
        hound::SampleFormat::Int => {
            let max_amplitude = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_amplitude))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| IoError::WavRead {
                    path: path_ref.display().to_string(),
                    reason: e.to_string(),
                })?
        }
    };

    if interleaved.is_empty() {
        return Err(IoError::EmptyBuffer.into());
    }

    let mono: Vec<f32> = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    Ok(AudioBuffer::new(mono, spec.sample_rate, 0.0))
}

/// Writes `buffer` to `path` as 32-bit float PCM, for generating synthetic
/// fixtures.
pub fn write_wav(path: impl AsRef<Path>, buffer: &AudioBuffer) -> Result<()> {
    let path_ref = path.as_ref();
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: buffer.sample_rate_hz,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path_ref, spec).map_err(|e| IoError::WavRead {
        path: path_ref.display().to_string(),
        reason: e.to_string(),
    })?;
    for &sample in &buffer.samples {
        writer.write_sample(sample).map_err(|e| IoError::WavRead {
            path: path_ref.display().to_string(),
            reason: e.to_string(),
        })?;
    }
    writer.finalize().map_err(|e| IoError::WavRead {
        path: path_ref.display().to_string(),
        reason: e.to_string(),
    })?;
    Ok(())
}

/// Scales `buffer` toward a target peak of roughly 0.9, bounded by a
/// maximum gain of 25x to avoid amplifying near-silent recordings into
/// pure noise.
pub fn normalize_peak(buffer: &mut AudioBuffer) -> NormalizationReport {
    const TARGET_PEAK: f32 = 0.9;
    const MAX_GAIN: f32 = 25.0;

    let pre_peak = buffer.samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
    let pre_rms = rms(&buffer.samples);

    let gain_applied = if pre_peak > 0.0 {
        (TARGET_PEAK / pre_peak).min(MAX_GAIN)
    } else {
        1.0
    };

    for sample in &mut buffer.samples {
        *sample *= gain_applied;
    }

    let post_peak = buffer.samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
    let post_rms = rms(&buffer.samples);

    NormalizationReport {
        gain_applied,
        pre_peak,
        post_peak,
        pre_rms,
        post_rms,
    }
}

fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}
