//! Error types for offline rendering

use disperser_core::DisperserError;
use thiserror::Error;

/// Offline rendering errors
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to read or write WAV: {0}")]
    Wav(#[from] hound::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DSP error: {0}")]
    Dsp(#[from] DisperserError),

    #[error("Unsupported channel count: {0} (mono or stereo only)")]
    UnsupportedChannels(usize),

    #[error("Unsupported sample format: {bits}-bit {format}")]
    UnsupportedFormat { bits: u16, format: &'static str },

    #[error("Channel length mismatch: expected {expected} frames, got {actual}")]
    ChannelMismatch { expected: usize, actual: usize },
}

/// Result type for offline rendering
pub type RenderResult<T> = Result<T, RenderError>;
