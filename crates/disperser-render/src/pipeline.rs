//! Offline render pipeline
//!
//! ```text
//! WAV ─► decoder ─► AudioBuffer ─► Disperser (block by block) ─► encoder ─► WAV
//! ```

use std::path::Path;

use disperser_core::{DisperserConfig, DisperserError, MAX_CHANNELS, MAX_SERIES, TopologyKey};
use disperser_dsp::{BlockProcessor, Disperser, ObserverCounters};

use crate::decoder::read_wav;
use crate::encoder::write_wav;
use crate::error::{RenderError, RenderResult};

/// Planar audio held in memory
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// One vector per channel, all the same length
    pub channels: Vec<Vec<f32>>,
    pub sample_rate: u32,
}

impl AudioBuffer {
    /// Silent buffer
    pub fn new(channel_count: usize, frames: usize, sample_rate: u32) -> Self {
        Self {
            channels: vec![vec![0.0; frames]; channel_count],
            sample_rate,
        }
    }

    /// Split interleaved samples into channels (a trailing partial frame is dropped)
    pub fn from_interleaved(samples: &[f32], channel_count: usize, sample_rate: u32) -> Self {
        let channel_count = channel_count.max(1);
        let frames = samples.len() / channel_count;
        let mut buffer = Self::new(channel_count, frames, sample_rate);
        for (frame, chunk) in samples.chunks_exact(channel_count).enumerate() {
            for (ch, &s) in chunk.iter().enumerate() {
                buffer.channels[ch][frame] = s;
            }
        }
        buffer
    }

    pub fn to_interleaved(&self) -> Vec<f32> {
        let frames = self.frames();
        let mut out = Vec::with_capacity(frames * self.channels.len());
        for frame in 0..frames {
            for channel in &self.channels {
                out.push(channel[frame]);
            }
        }
        out
    }

    #[inline]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of frames
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.frames() as f64 / self.sample_rate as f64
        }
    }

    fn validate(&self) -> RenderResult<()> {
        let count = self.channel_count();
        if count == 0 || count > MAX_CHANNELS {
            return Err(RenderError::UnsupportedChannels(count));
        }
        let expected = self.frames();
        if let Some(bad) = self.channels.iter().find(|c| c.len() != expected) {
            return Err(RenderError::ChannelMismatch {
                expected,
                actual: bad.len(),
            });
        }
        Ok(())
    }
}

/// Controls and engine configuration for one render
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    pub stages: f64,
    pub series: usize,
    pub frequency: f64,
    pub shape: f64,
    pub reverse: bool,
    pub invert: bool,
    /// Force shape to 0
    pub shape_lock_min: bool,
    /// Force shape to 1 (wins over `shape_lock_min`)
    pub shape_lock_max: bool,
    /// Host block size used to drive the disperser
    pub block_size: usize,
    pub config: DisperserConfig,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            stages: disperser_core::DEFAULT_STAGES as f64,
            series: disperser_core::DEFAULT_SERIES,
            frequency: disperser_core::DEFAULT_FREQ_HZ,
            shape: disperser_core::DEFAULT_SHAPE,
            reverse: false,
            invert: false,
            shape_lock_min: false,
            shape_lock_max: false,
            block_size: 512,
            config: DisperserConfig::default(),
        }
    }
}

impl RenderSettings {
    /// Reject values the parameter store would otherwise silently replace
    pub fn validate(&self) -> Result<(), DisperserError> {
        let numeric = [
            ("stages", self.stages),
            ("frequency", self.frequency),
            ("shape", self.shape),
        ];
        for (name, value) in numeric {
            if !value.is_finite() {
                return Err(DisperserError::InvalidParam(format!("{name} must be finite, got {value}")));
            }
        }
        if !(1..=MAX_SERIES).contains(&self.series) {
            return Err(DisperserError::InvalidParam(format!(
                "series must be in 1..={MAX_SERIES}, got {}",
                self.series
            )));
        }
        self.config.validate()
    }
}

/// Summary of a finished render
#[derive(Debug, Clone, PartialEq)]
pub struct RenderReport {
    pub sample_rate: u32,
    pub channels: usize,
    pub input_frames: usize,
    pub output_frames: usize,
    /// Flush appended after the input (reverse window)
    pub latency_samples: usize,
    pub tail_seconds: f64,
    pub topology: Option<TopologyKey>,
    /// Topology crossfades that ran to completion
    pub transitions: u64,
    /// Reverse frames pushed through the network
    pub frames_rendered: u64,
}

/// Render `input` through a freshly prepared disperser.
///
/// When the topology is reversed, `latency_samples` of silence are appended
/// so the last input frame is fully flushed.
pub fn render_buffers(input: &AudioBuffer, settings: &RenderSettings) -> RenderResult<(AudioBuffer, RenderReport)> {
    input.validate()?;
    settings.validate()?;

    let counters = ObserverCounters::new();
    let mut disperser = Disperser::new(settings.config.clone());
    disperser.set_observer(Box::new(counters.observer()));
    let params = disperser.params();
    params.set_stages(settings.stages);
    params.set_series(settings.series);
    params.set_frequency(settings.frequency);
    params.set_shape(settings.shape);
    params.set_reverse(settings.reverse);
    params.set_invert(settings.invert);
    params.set_shape_lock_min(settings.shape_lock_min);
    params.set_shape_lock_max(settings.shape_lock_max);
    disperser.prepare(input.sample_rate as f64, settings.block_size)?;

    let latency = disperser.latency_samples();
    let frames = input.frames() + latency;
    let mut output = AudioBuffer::new(input.channel_count(), frames, input.sample_rate);
    for (dst, src) in output.channels.iter_mut().zip(&input.channels) {
        dst[..src.len()].copy_from_slice(src);
    }

    let block = settings.block_size;
    let mut start = 0;
    while start < frames {
        let end = (start + block).min(frames);
        let mut views: Vec<&mut [f32]> = output
            .channels
            .iter_mut()
            .map(|c| &mut c[start..end])
            .collect();
        disperser.process_block(&mut views);
        start = end;
    }

    let report = RenderReport {
        sample_rate: input.sample_rate,
        channels: input.channel_count(),
        input_frames: input.frames(),
        output_frames: frames,
        latency_samples: latency,
        tail_seconds: disperser.tail_seconds(),
        topology: disperser.topology(),
        transitions: counters.completed(),
        frames_rendered: counters.frames(),
    };
    Ok((output, report))
}

/// Read `input`, render it and write a 32-bit float WAV to `output`
pub fn render_file(input: &Path, output: &Path, settings: &RenderSettings) -> RenderResult<RenderReport> {
    let source = read_wav(input)?;
    log::info!(
        "Rendering {} ({} ch, {} Hz, {:.2}s)",
        input.display(),
        source.channel_count(),
        source.sample_rate,
        source.duration()
    );

    let (rendered, report) = render_buffers(&source, settings)?;
    write_wav(output, &rendered)?;

    log::info!(
        "Wrote {} ({} frames, latency {} samples)",
        output.display(),
        report.output_frames,
        report.latency_samples
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn impulse(frames: usize, channels: usize) -> AudioBuffer {
        let mut buffer = AudioBuffer::new(channels, frames, 48000);
        for channel in &mut buffer.channels {
            channel[0] = 1.0;
        }
        buffer
    }

    #[test]
    fn test_interleave_roundtrip() {
        let samples = [0.1, -0.1, 0.2, -0.2, 0.3, -0.3, 0.4];
        let buffer = AudioBuffer::from_interleaved(&samples, 2, 44100);

        assert_eq!(buffer.frames(), 3);
        assert_eq!(buffer.channels[1], vec![-0.1, -0.2, -0.3]);
        assert_eq!(buffer.to_interleaved(), samples[..6].to_vec());
    }

    #[test]
    fn test_render_direct_single_stage() {
        let settings = RenderSettings {
            stages: 1.0,
            config: DisperserConfig::immediate(),
            ..RenderSettings::default()
        };
        let (out, report) = render_buffers(&impulse(1024, 2), &settings).unwrap();

        let a = disperser_dsp::coefficients::allpass_coefficient(1000.0, 48000.0);
        assert_eq!(report.latency_samples, 0);
        assert_eq!(out.frames(), 1024);
        assert_relative_eq!(out.channels[0][0] as f64, -a, epsilon = 1e-6);
        assert_eq!(out.channels[0], out.channels[1]);
        assert_eq!(report.topology, Some(TopologyKey::new(1, 1, false)));
    }

    #[test]
    fn test_render_reverse_appends_flush() {
        let settings = RenderSettings {
            reverse: true,
            ..RenderSettings::default()
        };
        let (out, report) = render_buffers(&impulse(2000, 1), &settings).unwrap();

        assert!(report.latency_samples > 0);
        assert_eq!(out.frames(), 2000 + report.latency_samples);
        assert_eq!(report.transitions, 0);
        assert!(report.frames_rendered > 0);
        assert!(report.tail_seconds > report.latency_samples as f64 / 48000.0);
    }

    #[test]
    fn test_render_rejects_bad_layouts() {
        let settings = RenderSettings::default();
        let quad = AudioBuffer::new(4, 16, 48000);
        assert!(matches!(
            render_buffers(&quad, &settings),
            Err(RenderError::UnsupportedChannels(4))
        ));

        let mut ragged = AudioBuffer::new(2, 16, 48000);
        ragged.channels[1].pop();
        assert!(matches!(
            render_buffers(&ragged, &settings),
            Err(RenderError::ChannelMismatch { expected: 16, actual: 15 })
        ));

        let zero_block = RenderSettings {
            block_size: 0,
            ..RenderSettings::default()
        };
        assert!(matches!(
            render_buffers(&impulse(16, 1), &zero_block),
            Err(RenderError::Dsp(DisperserError::InvalidBlockSize(0)))
        ));

        let bad_series = RenderSettings {
            series: 9,
            ..RenderSettings::default()
        };
        assert!(matches!(
            render_buffers(&impulse(16, 1), &bad_series),
            Err(RenderError::Dsp(DisperserError::InvalidParam(_)))
        ));
    }
}
