//! Instrumentation hooks for the audio thread
//!
//! The engine reports notable events through [`EngineObserver`]. Every method
//! has an empty default, so an observer only implements what it needs.
//! Implementations are called from the audio callback and must not block.

use std::sync::Arc;

use disperser_core::TopologyKey;
use portable_atomic::{AtomicU64, Ordering};

/// Receiver for real-time engine events
pub trait EngineObserver: Send + Sync {
    /// A crossfade from `from` to `to` began
    fn transition_started(&mut self, _from: TopologyKey, _to: TopologyKey) {}

    /// The standby engine took over; `active` is now the live topology
    fn transition_completed(&mut self, _active: TopologyKey) {}

    /// A topology request arrived mid-transition and was queued (replacing any earlier request)
    fn transition_coalesced(&mut self, _pending: TopologyKey) {}

    /// Stage coefficients were recomputed
    fn coefficients_rebuilt(&mut self, _stages: usize) {}

    /// A reverse frame went through the network
    fn frame_rendered(&mut self, _window_len: usize) {}
}

/// Observer that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl EngineObserver for NullObserver {}

/// Forwards engine events to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl EngineObserver for TracingObserver {
    fn transition_started(&mut self, from: TopologyKey, to: TopologyKey) {
        tracing::debug!(%from, %to, "topology transition started");
    }

    fn transition_completed(&mut self, active: TopologyKey) {
        tracing::debug!(%active, "topology transition completed");
    }

    fn transition_coalesced(&mut self, pending: TopologyKey) {
        tracing::trace!(%pending, "topology change queued");
    }

    fn coefficients_rebuilt(&mut self, stages: usize) {
        tracing::trace!(stages, "coefficients rebuilt");
    }

    fn frame_rendered(&mut self, window_len: usize) {
        tracing::trace!(window_len, "reverse frame rendered");
    }
}

/// Lock-free event counters, readable from any thread
#[derive(Debug, Default)]
pub struct ObserverCounters {
    pub transitions_started: AtomicU64,
    pub transitions_completed: AtomicU64,
    pub transitions_coalesced: AtomicU64,
    pub coefficient_rebuilds: AtomicU64,
    pub frames_rendered: AtomicU64,
}

impl ObserverCounters {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Observer handle that increments these counters
    pub fn observer(self: &Arc<Self>) -> CountingObserver {
        CountingObserver {
            counters: Arc::clone(self),
        }
    }

    #[inline]
    pub fn started(&self) -> u64 {
        self.transitions_started.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn completed(&self) -> u64 {
        self.transitions_completed.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn coalesced(&self) -> u64 {
        self.transitions_coalesced.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn rebuilds(&self) -> u64 {
        self.coefficient_rebuilds.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn frames(&self) -> u64 {
        self.frames_rendered.load(Ordering::Relaxed)
    }
}

/// Audio-thread side of [`ObserverCounters`]
#[derive(Debug, Clone)]
pub struct CountingObserver {
    counters: Arc<ObserverCounters>,
}

impl EngineObserver for CountingObserver {
    fn transition_started(&mut self, _from: TopologyKey, _to: TopologyKey) {
        self.counters.transitions_started.fetch_add(1, Ordering::Relaxed);
    }

    fn transition_completed(&mut self, _active: TopologyKey) {
        self.counters.transitions_completed.fetch_add(1, Ordering::Relaxed);
    }

    fn transition_coalesced(&mut self, _pending: TopologyKey) {
        self.counters.transitions_coalesced.fetch_add(1, Ordering::Relaxed);
    }

    fn coefficients_rebuilt(&mut self, _stages: usize) {
        self.counters.coefficient_rebuilds.fetch_add(1, Ordering::Relaxed);
    }

    fn frame_rendered(&mut self, _window_len: usize) {
        self.counters.frames_rendered.fetch_add(1, Ordering::Relaxed);
    }
}
