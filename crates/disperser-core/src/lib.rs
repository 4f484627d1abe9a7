//! disperser-core: Shared types, parameters and configuration for the disperser
//!
//! This crate provides the foundational types used by the DSP core and by any
//! host adapter wrapping it.

mod config;
mod error;
mod params;
mod sample;

pub use config::*;
pub use error::*;
pub use params::*;
pub use sample::*;

/// Lowest frequency any stage is allowed to sit at (Hz)
pub const MIN_FREQ_HZ: f64 = 20.0;

/// Highest center frequency the frequency control accepts (Hz)
pub const MAX_FREQ_HZ: f64 = 20_000.0;

/// Number of series (sequential chain repetitions) supported
pub const MAX_SERIES: usize = 4;

/// Channels processed by the engine (mono or stereo)
pub const MAX_CHANNELS: usize = 2;

/// Absolute ceiling for any sample-count derived from user controls
/// (reverse window, crossfade length).
pub const MAX_SAFE_SAMPLES: usize = 1 << 20;

/// Topology of one engine configuration.
///
/// Two engines with equal keys produce the same filter network shape; a change
/// of key is what triggers a crossfade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub struct TopologyKey {
    pub stages: usize,
    pub series: usize,
    pub reverse: bool,
}

impl TopologyKey {
    #[inline]
    pub const fn new(stages: usize, series: usize, reverse: bool) -> Self {
        Self {
            stages,
            series,
            reverse,
        }
    }
}

impl std::fmt::Display for TopologyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} stages x{}{}",
            self.stages,
            self.series,
            if self.reverse { " (reverse)" } else { "" }
        )
    }
}
