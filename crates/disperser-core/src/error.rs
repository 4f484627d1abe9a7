//! Error types for the disperser

use thiserror::Error;

/// Core error type
///
/// Only returned from setup paths (prepare, config validation). The audio
/// callback never produces one.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DisperserError {
    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(f64),

    #[error("Invalid block size: {0}")]
    InvalidBlockSize(usize),

    #[error("Invalid parameter: {0}")]
    InvalidParam(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias
pub type DisperserResult<T> = Result<T, DisperserError>;
