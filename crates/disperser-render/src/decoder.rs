//! WAV decoding (via hound)

use std::io::Read;
use std::path::Path;

use disperser_core::MAX_CHANNELS;

use crate::error::{RenderError, RenderResult};
use crate::pipeline::AudioBuffer;

/// Decode a WAV file (integer or float PCM, mono or stereo)
pub fn read_wav(path: &Path) -> RenderResult<AudioBuffer> {
    let reader = hound::WavReader::open(path)?;
    decode(reader)
}

/// Decode WAV data from any reader
pub fn decode<R: Read>(reader: hound::WavReader<R>) -> RenderResult<AudioBuffer> {
    let spec = reader.spec();
    let channels = spec.channels as usize;
    if channels == 0 || channels > MAX_CHANNELS {
        return Err(RenderError::UnsupportedChannels(channels));
    }

    let samples: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Float, 32) => reader.into_samples::<f32>().collect::<Result<_, _>>()?,
        (hound::SampleFormat::Int, bits @ 1..=32) => {
            let scale = 1.0 / (1u64 << (bits - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<_, _>>()?
        }
        (hound::SampleFormat::Float, bits) => {
            return Err(RenderError::UnsupportedFormat { bits, format: "float" });
        }
        (hound::SampleFormat::Int, bits) => {
            return Err(RenderError::UnsupportedFormat { bits, format: "int" });
        }
    };

    Ok(AudioBuffer::from_interleaved(&samples, channels, spec.sample_rate))
}
