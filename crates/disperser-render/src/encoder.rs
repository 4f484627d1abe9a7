//! WAV encoding (via hound)

use std::io::{Seek, Write};
use std::path::Path;

use crate::error::RenderResult;
use crate::pipeline::AudioBuffer;

/// Output format: 32-bit IEEE float
pub fn float_spec(channels: usize, sample_rate: u32) -> hound::WavSpec {
    hound::WavSpec {
        channels: channels as u16,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    }
}

/// Write `buffer` as a 32-bit float WAV file
pub fn write_wav(path: &Path, buffer: &AudioBuffer) -> RenderResult<()> {
    let writer = hound::WavWriter::create(path, float_spec(buffer.channel_count(), buffer.sample_rate))?;
    encode(writer, buffer)
}

/// Interleave `buffer` into an open writer and finalize it
pub fn encode<W: Write + Seek>(mut writer: hound::WavWriter<W>, buffer: &AudioBuffer) -> RenderResult<()> {
    for sample in buffer.to_interleaved() {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}
