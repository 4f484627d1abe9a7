//! First-order allpass stages and the stage chains built from them
//!
//! `y[n] = -a * x[n] + x[n-1] + a * y[n-1]`
//!
//! Unity magnitude at every frequency; only the phase is shaped. The
//! coefficient is owned by the engine and shared by every channel and series,
//! so stages only hold the one-sample history.

use disperser_core::{MAX_CHANNELS, Sample};

use crate::Processor;

/// One-sample history of a single allpass on a single channel
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AllpassState {
    pub x1: Sample,
    pub y1: Sample,
}

impl AllpassState {
    #[inline(always)]
    pub fn process(&mut self, x: Sample, a: Sample) -> Sample {
        let y = -a * x + self.x1 + a * self.y1;
        self.x1 = x;
        self.y1 = y;
        y
    }

    #[inline]
    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.y1 = 0.0;
    }
}

/// One allpass stage with independent history per channel
#[derive(Debug, Clone, Copy, Default)]
pub struct AllpassStage {
    channels: [AllpassState; MAX_CHANNELS],
}

impl AllpassStage {
    #[inline(always)]
    pub fn process(&mut self, channel: usize, x: Sample, a: Sample) -> Sample {
        self.channels[channel].process(x, a)
    }

    #[inline]
    pub fn state(&self, channel: usize) -> AllpassState {
        self.channels[channel]
    }

    #[inline]
    pub fn reset(&mut self) {
        for state in &mut self.channels {
            state.reset();
        }
    }
}

/// One full pass through the stage chain.
///
/// Capacity is fixed when the engine is prepared; [`NetworkInstance::resize`]
/// only moves the active length within that capacity and never allocates.
#[derive(Debug, Clone)]
pub struct NetworkInstance {
    stages: Vec<AllpassStage>,
    capacity: usize,
}

impl NetworkInstance {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            stages: Vec::with_capacity(capacity),
            capacity,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Set the active stage count (clamped to capacity) and clear all history
    pub fn resize(&mut self, stages: usize) {
        let stages = stages.min(self.capacity);
        self.stages.resize(stages, AllpassStage::default());
        self.reset_stages();
    }

    fn reset_stages(&mut self) {
        for stage in &mut self.stages {
            stage.reset();
        }
    }

    /// Run one sample of one channel through the whole chain.
    ///
    /// `coeffs` must hold at least `self.len()` values.
    #[inline]
    pub fn process(&mut self, channel: usize, x: Sample, coeffs: &[Sample]) -> Sample {
        debug_assert!(coeffs.len() >= self.stages.len());
        let mut y = x;
        for (stage, &a) in self.stages.iter_mut().zip(coeffs) {
            y = stage.process(channel, y, a);
        }
        y
    }

    /// Run a whole buffer of one channel through the chain in place
    pub fn process_buffer(&mut self, channel: usize, buffer: &mut [Sample], coeffs: &[Sample]) {
        for sample in buffer.iter_mut() {
            *sample = self.process(channel, *sample, coeffs);
        }
    }

    #[inline]
    pub fn stage(&self, index: usize) -> Option<&AllpassStage> {
        self.stages.get(index)
    }
}

impl Processor for NetworkInstance {
    fn reset(&mut self) {
        self.reset_stages();
    }
}
