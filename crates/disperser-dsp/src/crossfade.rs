//! Topology crossfade controller
//!
//! Stage count, series count and the reverse flag cannot change inside a
//! running network without clicks. The controller keeps two engines: the
//! active one carries the live signal, the standby one is configured for the
//! requested topology and faded in linearly. On completion the roles swap by
//! flipping an index; no engine state moves.
//!
//! Requests arriving mid-fade are coalesced into a single pending topology
//! (last write wins) that starts as soon as the running fade completes.

use disperser_core::{MAX_CHANNELS, MAX_SERIES, TopologyKey};

use crate::engine::DispersionEngine;
use crate::observer::EngineObserver;
use crate::Processor;

/// Mix weights `(active, standby)` at `position` samples into a fade of `duration`.
///
/// Weights always sum to 1 and the standby weight reaches 1 at `duration`.
#[inline]
pub fn crossfade_weights(position: usize, duration: usize) -> (f64, f64) {
    if duration == 0 {
        return (0.0, 1.0);
    }
    let t = (position as f64 / duration as f64).min(1.0);
    (1.0 - t, t)
}

/// Progress of a topology transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CrossfadeState {
    /// A fade is running
    pub in_progress: bool,
    /// Samples mixed so far
    pub position: usize,
    /// Fade length in samples
    pub duration: usize,
    /// Topology to apply once the running fade completes
    pub pending: Option<TopologyKey>,
}

/// Dual-engine controller for click-free topology changes
#[derive(Debug, Clone)]
pub struct TopologyCrossfade {
    engines: [DispersionEngine; 2],
    active: usize,
    state: CrossfadeState,
    scratch: [Vec<f32>; MAX_CHANNELS],
    freq: f64,
    shape: f64,
}

impl TopologyCrossfade {
    /// Allocate both engines and the standby scratch buffers.
    ///
    /// `max_chunk` is the largest slice mixed in one pass; longer buffers are
    /// split internally.
    pub fn new(
        sample_rate: f64,
        max_stages: usize,
        crossfade_samples: usize,
        max_chunk: usize,
    ) -> Self {
        let chunk = max_chunk.max(1);
        Self {
            engines: [
                DispersionEngine::new(sample_rate, max_stages),
                DispersionEngine::new(sample_rate, max_stages),
            ],
            active: 0,
            state: CrossfadeState {
                duration: crossfade_samples,
                ..CrossfadeState::default()
            },
            scratch: std::array::from_fn(|_| vec![0.0; chunk]),
            freq: disperser_core::DEFAULT_FREQ_HZ,
            shape: disperser_core::DEFAULT_SHAPE,
        }
    }

    #[inline]
    pub fn active_engine(&self) -> &DispersionEngine {
        &self.engines[self.active]
    }

    #[inline]
    pub fn standby_engine(&self) -> &DispersionEngine {
        &self.engines[self.active ^ 1]
    }

    /// Slot index of the active engine (0 or 1)
    #[inline]
    pub fn active_index(&self) -> usize {
        self.active
    }

    #[inline]
    pub fn state(&self) -> CrossfadeState {
        self.state
    }

    #[inline]
    pub fn is_transitioning(&self) -> bool {
        self.state.in_progress
    }

    /// Topology the controller is heading to: the fade target while
    /// transitioning, otherwise the active topology. Pending requests are not included.
    pub fn target_topology(&self) -> TopologyKey {
        if self.state.in_progress {
            self.standby_engine().topology()
        } else {
            self.active_engine().topology()
        }
    }

    #[inline]
    pub fn crossfade_samples(&self) -> usize {
        self.state.duration
    }

    fn normalize(&self, key: TopologyKey) -> TopologyKey {
        TopologyKey::new(
            key.stages.min(self.active_engine().max_stages()),
            key.series.clamp(1, MAX_SERIES),
            key.reverse,
        )
    }

    /// Establish `key` on the active engine with no fade, dropping any transition
    pub fn initialize(&mut self, key: TopologyKey, freq: f64, shape: f64) {
        self.freq = freq;
        self.shape = shape;
        self.state.in_progress = false;
        self.state.position = 0;
        self.state.pending = None;
        let key = self.normalize(key);
        self.engines[self.active].set_topology(key, freq, shape);
        self.engines[self.active ^ 1].set_topology(key, freq, shape);
    }

    /// Ask for `key` to become the live topology.
    ///
    /// Starts a fade when idle, queues the request when a fade is running.
    pub fn request(
        &mut self,
        key: TopologyKey,
        freq: f64,
        shape: f64,
        observer: &mut dyn EngineObserver,
    ) {
        self.freq = freq;
        self.shape = shape;
        let key = self.normalize(key);

        if !self.state.in_progress {
            if key != self.active_engine().topology() {
                self.start_transition(key, observer);
            }
            return;
        }

        if key == self.standby_engine().topology() {
            // Back to the in-flight target: nothing left to queue
            self.state.pending = None;
        } else if self.state.pending != Some(key) {
            self.state.pending = Some(key);
            observer.transition_coalesced(key);
        }
    }

    fn start_transition(&mut self, key: TopologyKey, observer: &mut dyn EngineObserver) {
        let from = self.active_engine().topology();
        let standby = &mut self.engines[self.active ^ 1];
        standby.set_topology(key, self.freq, self.shape);
        observer.coefficients_rebuilt(key.stages);

        self.state.in_progress = true;
        self.state.position = 0;
        observer.transition_started(from, key);
    }

    fn complete_transition(&mut self, observer: &mut dyn EngineObserver) {
        self.active ^= 1;
        self.state.in_progress = false;
        self.state.position = 0;
        observer.transition_completed(self.active_engine().topology());

        if let Some(next) = self.state.pending.take() {
            if next != self.active_engine().topology() {
                self.start_transition(next, observer);
            }
        }
    }

    /// Refresh coefficients of every engine that is producing output
    pub fn update_coefficients(&mut self, freq: f64, shape: f64, observer: &mut dyn EngineObserver) {
        self.freq = freq;
        self.shape = shape;

        let active = self.active;
        if self.engines[active].update_coefficients(freq, shape) {
            observer.coefficients_rebuilt(self.engines[active].topology().stages);
        }
        if self.state.in_progress && self.engines[active ^ 1].update_coefficients(freq, shape) {
            observer.coefficients_rebuilt(self.engines[active ^ 1].topology().stages);
        }
    }

    /// Process `left` (and `right`) in place through the active engine,
    /// mixing in the standby engine while a fade runs
    pub fn process(
        &mut self,
        left: &mut [f32],
        mut right: Option<&mut [f32]>,
        observer: &mut dyn EngineObserver,
    ) {
        let len = match right.as_deref() {
            Some(r) => left.len().min(r.len()),
            None => left.len(),
        };
        let chunk = self.scratch[0].len();

        let mut start = 0;
        while start < len {
            let end = (start + chunk).min(len);
            let r = right.as_deref_mut().map(|r| &mut r[start..end]);
            self.process_chunk(&mut left[start..end], r, observer);
            start = end;
        }
    }

    fn process_chunk(
        &mut self,
        left: &mut [f32],
        mut right: Option<&mut [f32]>,
        observer: &mut dyn EngineObserver,
    ) {
        if !self.state.in_progress {
            self.engines[self.active].process(left, right, observer);
            return;
        }

        let n = left.len();
        let [scratch_left, scratch_right] = &mut self.scratch;
        let scratch_left = &mut scratch_left[..n];
        let scratch_right = &mut scratch_right[..n];
        scratch_left.copy_from_slice(left);
        if let Some(r) = right.as_deref() {
            scratch_right.copy_from_slice(r);
        }

        let (active, standby) = engine_pair(&mut self.engines, self.active);
        active.process(left, right.as_deref_mut(), observer);
        standby.process(
            scratch_left,
            right.is_some().then_some(&mut *scratch_right),
            observer,
        );

        let position = self.state.position;
        let duration = self.state.duration;
        mix_into(left, scratch_left, position, duration);
        if let Some(r) = right {
            mix_into(r, scratch_right, position, duration);
        }

        self.state.position = position + n;
        if self.state.position >= duration {
            self.complete_transition(observer);
        }
    }

    /// Inherent delay of the active engine
    pub fn latency(&self) -> usize {
        self.active_engine().latency()
    }

    /// Dispersion tail of the active engine in samples
    pub fn group_delay_samples(&self) -> f64 {
        self.active_engine().group_delay_samples()
    }

    /// Clear both engines, settling on the most recent requested topology without a fade
    pub fn reset(&mut self) {
        if self.state.in_progress {
            self.active ^= 1;
        }
        if let Some(next) = self.state.pending.take() {
            let (freq, shape) = (self.freq, self.shape);
            self.engines[self.active].set_topology(next, freq, shape);
        }
        self.state.in_progress = false;
        self.state.position = 0;

        for engine in &mut self.engines {
            engine.reset();
        }
    }
}

fn engine_pair(
    engines: &mut [DispersionEngine; 2],
    active: usize,
) -> (&mut DispersionEngine, &mut DispersionEngine) {
    let [first, second] = engines;
    if active == 0 { (first, second) } else { (second, first) }
}

#[inline]
fn mix_into(out: &mut [f32], standby: &[f32], position: usize, duration: usize) {
    for (k, (y, &s)) in out.iter_mut().zip(standby).enumerate() {
        let (wa, ws) = crossfade_weights(position + k, duration);
        *y = (wa * *y as f64 + ws * s as f64) as f32;
    }
}
