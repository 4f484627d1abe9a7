//! disperser-dsp: Real-time dispersion core
//!
//! Cascaded first-order allpass networks with per-stage frequencies spread
//! and pinched around a center frequency, run sample by sample inside the
//! audio callback.
//!
//! ## Modules
//! - `coefficients` - Stage frequency ladder and bilinear allpass coefficients
//! - `allpass` - Allpass stage and network instance
//! - `window` - Square-root Hann window
//! - `reverse` - Reverse overlap-add pipeline
//! - `engine` - One topology: coefficients, series networks, reverse pipeline
//! - `crossfade` - Dual-engine topology crossfade controller
//! - `smoothing` - Lock-free parameter smoothing
//! - `observer` - Real-time instrumentation hooks
//! - `disperser` - Block orchestrator and host contract

pub mod allpass;
pub mod coefficients;
pub mod crossfade;
pub mod disperser;
pub mod engine;
pub mod observer;
pub mod reverse;
pub mod smoothing;
pub mod window;

pub use crossfade::{CrossfadeState, TopologyCrossfade};
pub use disperser::Disperser;
pub use engine::DispersionEngine;
pub use observer::{CountingObserver, EngineObserver, NullObserver, ObserverCounters, TracingObserver};

use disperser_core::{DisperserResult, HostSample};

/// Trait for all DSP processors
pub trait Processor: Send + Sync {
    /// Reset processor state
    fn reset(&mut self);

    /// Get latency in samples
    fn latency(&self) -> usize {
        0
    }
}

/// Host-facing block processor.
///
/// `prepare` runs off the audio thread and may allocate; `process_block`
/// runs inside the callback, never allocates and never fails.
pub trait BlockProcessor: Processor {
    /// Size every buffer for `sample_rate` and blocks up to `max_block_size`
    fn prepare(&mut self, sample_rate: f64, max_block_size: usize) -> DisperserResult<()>;

    /// Process one block in place, one slice per channel
    fn process_block(&mut self, channels: &mut [&mut [HostSample]]);
}
