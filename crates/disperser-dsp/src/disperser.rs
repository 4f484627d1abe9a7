//! Block orchestrator
//!
//! Glue between the parameter store and the crossfade controller. Each block
//! is cut into control-rate sub-blocks; per sub-block the smoothed controls
//! are stepped, the stage count goes through hysteresis, the desired topology
//! is handed to the controller and coefficients are refreshed. The output
//! sign flip is applied last.

use std::sync::Arc;

use disperser_core::{
    DisperserConfig, DisperserError, DisperserParams, DisperserResult, HostSample,
    MAX_SAFE_SAMPLES, ParamSnapshot, TopologyKey, invert_in_place, ms_to_samples,
};

use crate::crossfade::TopologyCrossfade;
use crate::observer::{EngineObserver, NullObserver};
use crate::smoothing::{SmoothedParam, SmoothingType};
use crate::{BlockProcessor, Processor};

/// Resolve a smoothed stage count to an integer with a dead-zone.
///
/// The active count only moves once the smoothed value is more than
/// `0.5 + hysteresis` away from it.
#[inline]
pub fn resolve_stage_count(smoothed: f64, active: usize, hysteresis: f64) -> usize {
    if !smoothed.is_finite() {
        return active;
    }
    if (smoothed - active as f64).abs() > 0.5 + hysteresis {
        smoothed.round().max(0.0) as usize
    } else {
        active
    }
}

/// Everything that only exists between `prepare` and `release_resources`
#[derive(Debug)]
struct PreparedState {
    sample_rate: f64,
    max_block_size: usize,
    control_interval: usize,
    hysteresis: f64,
    stages: SmoothedParam,
    frequency: SmoothedParam,
    shape: SmoothedParam,
    active_stages: usize,
    crossfade: TopologyCrossfade,
}

impl PreparedState {
    fn new(config: &DisperserConfig, snapshot: &ParamSnapshot, sample_rate: f64, max_block_size: usize) -> Self {
        let max_stages = config.max_stages;
        let stages = SmoothedParam::with_range(
            snapshot.stages,
            config.stage_smoothing_ms,
            sample_rate,
            SmoothingType::Linear,
            0.0,
            max_stages as f64,
        );
        let frequency = SmoothedParam::with_range(
            snapshot.frequency,
            config.freq_smoothing_ms,
            sample_rate,
            SmoothingType::Linear,
            disperser_core::MIN_FREQ_HZ,
            disperser_core::MAX_FREQ_HZ,
        );
        let shape = SmoothedParam::with_range(
            snapshot.shape,
            config.shape_smoothing_ms,
            sample_rate,
            SmoothingType::Linear,
            0.0,
            1.0,
        );

        let crossfade_samples = ms_to_samples(config.crossfade_ms, sample_rate, 1, MAX_SAFE_SAMPLES);
        let crossfade =
            TopologyCrossfade::new(sample_rate, max_stages, crossfade_samples, config.control_interval);

        let mut state = Self {
            sample_rate,
            max_block_size,
            control_interval: config.control_interval,
            hysteresis: config.stage_hysteresis,
            active_stages: stages.current().round() as usize,
            stages,
            frequency,
            shape,
            crossfade,
        };
        state.settle(snapshot);
        state
    }

    /// Jump every control to `snapshot` and establish its topology without a fade
    fn settle(&mut self, snapshot: &ParamSnapshot) {
        self.stages.set_immediate(snapshot.stages);
        self.frequency.set_immediate(snapshot.frequency);
        self.shape.set_immediate(snapshot.shape);
        self.active_stages = self.stages.current().round() as usize;

        let key = TopologyKey::new(self.active_stages, snapshot.series, snapshot.reverse);
        self.crossfade
            .initialize(key, self.frequency.current(), self.shape.current());
        self.crossfade.reset();
    }

    fn render(
        &mut self,
        left: &mut [HostSample],
        mut right: Option<&mut [HostSample]>,
        snapshot: &ParamSnapshot,
        observer: &mut dyn EngineObserver,
    ) {
        self.stages.set_target(snapshot.stages);
        self.frequency.set_target(snapshot.frequency);
        self.shape.set_target(snapshot.shape);

        let len = match right.as_deref() {
            Some(r) => left.len().min(r.len()),
            None => left.len(),
        };

        let mut start = 0;
        while start < len {
            let end = (start + self.control_interval).min(len);
            let n = end - start;

            let stages = self.stages.advance(n);
            let freq = self.frequency.advance(n);
            let shape = self.shape.advance(n);
            self.active_stages = resolve_stage_count(stages, self.active_stages, self.hysteresis);

            let key = TopologyKey::new(self.active_stages, snapshot.series, snapshot.reverse);
            self.crossfade.request(key, freq, shape, observer);
            self.crossfade.update_coefficients(freq, shape, observer);

            let r = right.as_deref_mut().map(|r| &mut r[start..end]);
            self.crossfade.process(&mut left[start..end], r, observer);

            start = end;
        }

        if snapshot.invert {
            invert_in_place(&mut left[..len]);
            if let Some(r) = right {
                invert_in_place(&mut r[..len]);
            }
        }
    }
}

/// The dispersion effect as seen by a host.
///
/// Controls are read from a shared [`DisperserParams`]; all processing state
/// is private to the audio thread. Until [`BlockProcessor::prepare`] succeeds,
/// `process_block` leaves buffers untouched.
pub struct Disperser {
    params: Arc<DisperserParams>,
    config: DisperserConfig,
    state: Option<PreparedState>,
    observer: Box<dyn EngineObserver>,
}

impl std::fmt::Debug for Disperser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Disperser")
            .field("params", &self.params)
            .field("config", &self.config)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Disperser {
    /// New disperser with its own parameter store
    pub fn new(config: DisperserConfig) -> Self {
        let params = Arc::new(DisperserParams::new(config.max_stages));
        Self::with_params(config, params)
    }

    /// New disperser reading controls from a shared store
    pub fn with_params(config: DisperserConfig, params: Arc<DisperserParams>) -> Self {
        Self {
            params,
            config,
            state: None,
            observer: Box::new(NullObserver),
        }
    }

    /// Shared parameter store (hand a clone to the UI/automation side)
    #[inline]
    pub fn params(&self) -> Arc<DisperserParams> {
        Arc::clone(&self.params)
    }

    #[inline]
    pub fn config(&self) -> &DisperserConfig {
        &self.config
    }

    /// Replace the instrumentation observer
    pub fn set_observer(&mut self, observer: Box<dyn EngineObserver>) {
        self.observer = observer;
    }

    #[inline]
    pub fn is_prepared(&self) -> bool {
        self.state.is_some()
    }

    pub fn sample_rate(&self) -> Option<f64> {
        self.state.as_ref().map(|s| s.sample_rate)
    }

    pub fn max_block_size(&self) -> Option<usize> {
        self.state.as_ref().map(|s| s.max_block_size)
    }

    /// Topology currently producing output
    pub fn topology(&self) -> Option<TopologyKey> {
        self.state
            .as_ref()
            .map(|s| s.crossfade.active_engine().topology())
    }

    pub fn is_transitioning(&self) -> bool {
        self.state
            .as_ref()
            .is_some_and(|s| s.crossfade.is_transitioning())
    }

    /// Topology crossfade length in samples (0 while unprepared)
    pub fn crossfade_samples(&self) -> usize {
        self.state
            .as_ref()
            .map_or(0, |s| s.crossfade.crossfade_samples())
    }

    /// Output delay: the reverse window length while reversed, else 0
    pub fn latency_samples(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.crossfade.latency())
    }

    /// Estimated length of the dispersion tail in seconds
    pub fn tail_seconds(&self) -> f64 {
        match &self.state {
            Some(s) => {
                let samples = s.crossfade.group_delay_samples() + s.crossfade.latency() as f64;
                samples / s.sample_rate
            }
            None => 0.0,
        }
    }

    /// Drop all processing buffers; `process_block` no-ops until the next `prepare`
    pub fn release_resources(&mut self) {
        if self.state.take().is_some() {
            log::debug!("disperser resources released");
        }
    }
}

impl Default for Disperser {
    fn default() -> Self {
        Self::new(DisperserConfig::default())
    }
}

impl Processor for Disperser {
    fn reset(&mut self) {
        let snapshot = self.params.snapshot();
        if let Some(state) = self.state.as_mut() {
            state.settle(&snapshot);
            log::debug!(
                "disperser reset to {}",
                state.crossfade.active_engine().topology()
            );
        }
    }

    fn latency(&self) -> usize {
        self.latency_samples()
    }
}

impl BlockProcessor for Disperser {
    fn prepare(&mut self, sample_rate: f64, max_block_size: usize) -> DisperserResult<()> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            self.state = None;
            log::warn!("rejecting prepare: invalid sample rate {sample_rate}");
            return Err(DisperserError::InvalidSampleRate(sample_rate));
        }
        if max_block_size == 0 {
            self.state = None;
            log::warn!("rejecting prepare: zero block size");
            return Err(DisperserError::InvalidBlockSize(max_block_size));
        }
        if let Err(e) = self.config.validate() {
            self.state = None;
            log::warn!("rejecting prepare: {e}");
            return Err(e);
        }

        let snapshot = self.params.snapshot();
        let state = PreparedState::new(&self.config, &snapshot, sample_rate, max_block_size);
        log::info!(
            "disperser prepared: {sample_rate} Hz, max block {max_block_size}, {}, crossfade {} samples",
            state.crossfade.active_engine().topology(),
            state.crossfade.crossfade_samples()
        );
        self.state = Some(state);
        Ok(())
    }

    fn process_block(&mut self, channels: &mut [&mut [HostSample]]) {
        let Some(state) = self.state.as_mut() else {
            return;
        };
        let snapshot = self.params.snapshot();
        let observer = self.observer.as_mut();

        match channels {
            [] => {}
            [mono] => state.render(mono, None, &snapshot, observer),
            [left, right, ..] => state.render(left, Some(&mut **right), &snapshot, observer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::ObserverCounters;

    fn prepared(config: DisperserConfig) -> Disperser {
        let mut disperser = Disperser::new(config);
        disperser.prepare(48000.0, 512).unwrap();
        disperser
    }

    #[test]
    fn test_hysteresis() {
        assert_eq!(resolve_stage_count(10.6, 10, 0.15), 10);
        assert_eq!(resolve_stage_count(9.4, 10, 0.15), 10);
        assert_eq!(resolve_stage_count(10.66, 10, 0.15), 11);
        assert_eq!(resolve_stage_count(9.3, 10, 0.15), 9);
        assert_eq!(resolve_stage_count(20.0, 10, 0.15), 20);
        assert_eq!(resolve_stage_count(f64::NAN, 10, 0.15), 10);
    }

    #[test]
    fn test_prepare_rejects_bad_input() {
        let mut disperser = Disperser::default();
        assert_eq!(
            disperser.prepare(0.0, 512),
            Err(DisperserError::InvalidSampleRate(0.0))
        );
        assert!(disperser.prepare(f64::NAN, 512).is_err());
        assert!(disperser.prepare(f64::INFINITY, 512).is_err());
        assert_eq!(
            disperser.prepare(48000.0, 0),
            Err(DisperserError::InvalidBlockSize(0))
        );
        assert!(!disperser.is_prepared());

        let mut bad = Disperser::new(DisperserConfig::default().with_control_interval(0));
        assert!(matches!(
            bad.prepare(48000.0, 512),
            Err(DisperserError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_prepare_rejects_oversized_control_interval() {
        // Must fail before any sub-block scratch is allocated
        let mut disperser = Disperser::new(DisperserConfig::default().with_control_interval(1 << 40));
        assert!(matches!(
            disperser.prepare(48000.0, 256),
            Err(DisperserError::InvalidConfig(_))
        ));
        assert!(!disperser.is_prepared());

        let mut widest = Disperser::new(
            DisperserConfig::default().with_control_interval(disperser_core::MAX_CONTROL_INTERVAL),
        );
        assert!(widest.prepare(48000.0, 256).is_ok());
    }

    #[test]
    fn test_failed_prepare_unprepares() {
        let mut disperser = prepared(DisperserConfig::default());
        assert!(disperser.is_prepared());
        assert!(disperser.prepare(-1.0, 512).is_err());
        assert!(!disperser.is_prepared());
    }

    #[test]
    fn test_prepare_uses_params() {
        let mut disperser = Disperser::default();
        let params = disperser.params();
        params.set_stages(12.0);
        params.set_series(3);
        params.set_reverse(true);
        disperser.prepare(44100.0, 256).unwrap();

        assert_eq!(disperser.topology(), Some(TopologyKey::new(12, 3, true)));
        assert_eq!(disperser.crossfade_samples(), 2205);
        assert!(disperser.latency_samples() > 0);
        assert_eq!(disperser.latency(), disperser.latency_samples());
    }

    #[test]
    fn test_release_resources() {
        let mut disperser = prepared(DisperserConfig::default());
        disperser.release_resources();
        assert!(!disperser.is_prepared());
        assert_eq!(disperser.latency_samples(), 0);
        assert_eq!(disperser.tail_seconds(), 0.0);

        let mut buf = vec![0.5f32; 64];
        disperser.process_block(&mut [&mut buf[..]]);
        assert!(buf.iter().all(|&x| x == 0.5));
    }

    #[test]
    fn test_stage_smoothing_defers_topology() {
        let counters = ObserverCounters::new();
        let mut disperser = prepared(DisperserConfig::default().with_smoothing_ms(10.0, 0.0, 0.0));
        disperser.set_observer(Box::new(counters.observer()));
        let params = disperser.params();
        params.set_stages(40.0);

        // 10 ms ramp from 32 to 40: the first sub-block is still inside the dead-zone
        let mut buf = vec![0.0f32; 32];
        disperser.process_block(&mut [&mut buf[..]]);
        assert_eq!(disperser.topology(), Some(TopologyKey::new(32, 1, false)));
        assert_eq!(counters.started(), 0);

        // Intermediate counts coalesce; the last one needs a second fade
        let mut block = vec![0.0f32; 512];
        for _ in 0..16 {
            disperser.process_block(&mut [&mut block[..]]);
        }
        assert_eq!(disperser.topology(), Some(TopologyKey::new(40, 1, false)));
        assert!(counters.started() >= 1);
    }

    #[test]
    fn test_tail_reports_reverse_window() {
        let mut direct = Disperser::new(DisperserConfig::immediate());
        direct.params().set_stages(64.0);
        direct.prepare(48000.0, 512).unwrap();

        let mut reversed = Disperser::new(DisperserConfig::immediate());
        reversed.params().set_stages(64.0);
        reversed.params().set_reverse(true);
        reversed.prepare(48000.0, 512).unwrap();

        assert!(direct.tail_seconds() > 0.0);
        let extra = reversed.tail_seconds() - direct.tail_seconds();
        let window = reversed.latency_samples() as f64 / 48000.0;
        assert!((extra - window).abs() < 1e-9);
    }

    #[test]
    fn test_reset_settles_without_fade() {
        let mut disperser = prepared(DisperserConfig::default());
        disperser.params().set_series(4);
        disperser.reset();

        assert!(!disperser.is_transitioning());
        assert_eq!(disperser.topology(), Some(TopologyKey::new(32, 4, false)));
    }
}
