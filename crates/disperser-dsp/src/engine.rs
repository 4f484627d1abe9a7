//! Dispersion engine
//!
//! One complete signal path for a single topology: the stage coefficients,
//! up to [`MAX_SERIES`] network instances run back to back, and the reverse
//! overlap-add pipeline. Everything is allocated in [`DispersionEngine::new`];
//! switching topology only moves active lengths inside those buffers.

use disperser_core::{MAX_CHANNELS, MAX_SERIES, Sample, TopologyKey};

use crate::allpass::NetworkInstance;
use crate::coefficients::{CoefficientBin, fill_stage_coefficients};
use crate::observer::EngineObserver;
use crate::reverse::{ReversePipeline, window_length_samples};
use crate::Processor;

/// Stage chain, series passes and reverse pipeline for one topology
#[derive(Debug, Clone)]
pub struct DispersionEngine {
    sample_rate: f64,
    max_stages: usize,
    topology: TopologyKey,
    coefficients: Vec<Sample>,
    networks: Vec<NetworkInstance>,
    reverse: ReversePipeline,
    /// Bin the current coefficients were computed for
    coefficient_bin: Option<CoefficientBin>,
}

impl DispersionEngine {
    /// Allocate an engine able to hold up to `max_stages` stages per series.
    ///
    /// Starts with an empty (pass-through) direct topology.
    pub fn new(sample_rate: f64, max_stages: usize) -> Self {
        Self {
            sample_rate,
            max_stages,
            topology: TopologyKey::new(0, 1, false),
            coefficients: vec![0.0; max_stages],
            networks: (0..MAX_SERIES)
                .map(|_| NetworkInstance::with_capacity(max_stages))
                .collect(),
            reverse: ReversePipeline::with_capacity(window_length_samples(
                max_stages,
                max_stages,
                sample_rate,
            )),
            coefficient_bin: None,
        }
    }

    #[inline]
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    #[inline]
    pub fn max_stages(&self) -> usize {
        self.max_stages
    }

    #[inline]
    pub fn topology(&self) -> TopologyKey {
        self.topology
    }

    /// Coefficients of the active stages
    #[inline]
    pub fn coefficients(&self) -> &[Sample] {
        &self.coefficients[..self.topology.stages]
    }

    /// Reverse window length in samples, or 0 when the topology is direct
    #[inline]
    pub fn window_len(&self) -> usize {
        if self.topology.reverse { self.reverse.window_len() } else { 0 }
    }

    /// Re-establish the engine for `key`.
    ///
    /// Clears every stage history, rebuilds the coefficients and, for a
    /// reversed topology, resizes and clears the overlap-add pipeline.
    pub fn set_topology(&mut self, key: TopologyKey, freq: f64, shape: f64) {
        let stages = key.stages.min(self.max_stages);
        let series = key.series.clamp(1, MAX_SERIES);
        self.topology = TopologyKey::new(stages, series, key.reverse);

        for network in &mut self.networks {
            network.resize(stages);
        }

        self.coefficient_bin = None;
        self.update_coefficients(freq, shape);

        if key.reverse {
            self.reverse
                .configure(window_length_samples(stages, self.max_stages, self.sample_rate));
        }
    }

    /// Recompute coefficients if (`freq`, `shape`) moved to a new bin.
    ///
    /// Returns `true` when the coefficients were rebuilt.
    pub fn update_coefficients(&mut self, freq: f64, shape: f64) -> bool {
        let stages = self.topology.stages;
        let bin = CoefficientBin::quantize(freq, shape, stages);
        if self.coefficient_bin == Some(bin) {
            return false;
        }
        self.coefficient_bin = Some(bin);
        fill_stage_coefficients(
            &mut self.coefficients[..stages],
            freq,
            shape,
            self.max_stages,
            self.sample_rate,
        );
        true
    }

    /// Process `left` (and `right`, if present) in place
    pub fn process(
        &mut self,
        left: &mut [f32],
        right: Option<&mut [f32]>,
        observer: &mut dyn EngineObserver,
    ) {
        if self.topology.reverse {
            self.process_reverse(left, right, observer);
        } else {
            self.process_direct(0, left);
            if let Some(right) = right {
                self.process_direct(1, right);
            }
        }
    }

    fn process_direct(&mut self, channel: usize, buffer: &mut [f32]) {
        let stages = self.topology.stages;
        if stages == 0 {
            return;
        }
        let coeffs = &self.coefficients[..stages];
        let networks = &mut self.networks[..self.topology.series];

        for sample in buffer.iter_mut() {
            let mut y = *sample as Sample;
            for network in networks.iter_mut() {
                y = network.process(channel, y, coeffs);
            }
            *sample = y as f32;
        }
    }

    fn process_reverse(
        &mut self,
        left: &mut [f32],
        mut right: Option<&mut [f32]>,
        observer: &mut dyn EngineObserver,
    ) {
        let channels = if right.is_some() { MAX_CHANNELS } else { 1 };
        let len = match right.as_deref() {
            Some(r) => left.len().min(r.len()),
            None => left.len(),
        };
        let stages = self.topology.stages;
        let series = self.topology.series;

        for n in 0..len {
            left[n] = self.reverse.push(0, left[n] as Sample) as f32;
            if let Some(r) = right.as_deref_mut() {
                r[n] = self.reverse.push(1, r[n] as Sample) as f32;
            }

            if !self.reverse.advance() {
                continue;
            }

            let coeffs = &self.coefficients[..stages];
            let networks = &mut self.networks[..series];
            self.reverse.render_frame(channels, |channel, frame| {
                if stages == 0 {
                    return;
                }
                for network in networks.iter_mut() {
                    network.reset();
                    network.process_buffer(channel, frame, coeffs);
                }
            });
            observer.frame_rendered(self.reverse.window_len());
        }
    }

    /// Summed DC group delay of every active stage over all series passes
    pub fn group_delay_samples(&self) -> f64 {
        let per_series: f64 = self
            .coefficients()
            .iter()
            .map(|&a| (1.0 + a) / (1.0 - a))
            .sum();
        per_series * self.topology.series as f64
    }
}

impl Processor for DispersionEngine {
    fn reset(&mut self) {
        for network in &mut self.networks {
            network.reset();
        }
        self.reverse.reset();
    }

    fn latency(&self) -> usize {
        self.window_len()
    }
}
