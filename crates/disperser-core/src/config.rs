//! Engine configuration

use serde::{Deserialize, Serialize};

use crate::{DisperserError, DisperserResult};

/// Default stage ceiling
pub const DEFAULT_MAX_STAGES: usize = 128;

/// Largest stage ceiling accepted by [`DisperserConfig::validate`]
pub const STAGE_CEILING: usize = 256;

/// Longest control-rate sub-block accepted by [`DisperserConfig::validate`]
pub const MAX_CONTROL_INTERVAL: usize = 4096;

/// Disperser configuration.
///
/// Fixed for the lifetime of a prepared engine; changing it requires a new
/// `prepare` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisperserConfig {
    /// Upper bound of the stage-count control
    pub max_stages: usize,

    /// Topology crossfade duration
    pub crossfade_ms: f64,

    /// Linear ramp time of the stage-count control
    pub stage_smoothing_ms: f64,

    /// Linear ramp time of the center frequency
    pub freq_smoothing_ms: f64,

    /// Linear ramp time of the shape control
    pub shape_smoothing_ms: f64,

    /// Extra dead-zone (in stages) beyond ±0.5 around the active stage count
    pub stage_hysteresis: f64,

    /// Samples per control-rate sub-block
    pub control_interval: usize,
}

impl Default for DisperserConfig {
    fn default() -> Self {
        Self {
            max_stages: DEFAULT_MAX_STAGES,
            crossfade_ms: 50.0,
            stage_smoothing_ms: 2000.0,
            freq_smoothing_ms: 1000.0,
            shape_smoothing_ms: 100.0,
            stage_hysteresis: 0.15,
            control_interval: 32,
        }
    }
}

impl DisperserConfig {
    /// Config without any parameter smoothing (every change lands on the next sub-block)
    pub fn immediate() -> Self {
        Self {
            stage_smoothing_ms: 0.0,
            freq_smoothing_ms: 0.0,
            shape_smoothing_ms: 0.0,
            ..Default::default()
        }
    }

    pub fn with_max_stages(mut self, max_stages: usize) -> Self {
        self.max_stages = max_stages;
        self
    }

    pub fn with_crossfade_ms(mut self, ms: f64) -> Self {
        self.crossfade_ms = ms;
        self
    }

    /// Set all three smoothing times at once
    pub fn with_smoothing_ms(mut self, stages: f64, freq: f64, shape: f64) -> Self {
        self.stage_smoothing_ms = stages;
        self.freq_smoothing_ms = freq;
        self.shape_smoothing_ms = shape;
        self
    }

    pub fn with_stage_hysteresis(mut self, hysteresis: f64) -> Self {
        self.stage_hysteresis = hysteresis;
        self
    }

    pub fn with_control_interval(mut self, samples: usize) -> Self {
        self.control_interval = samples;
        self
    }

    pub fn validate(&self) -> DisperserResult<()> {
        if self.max_stages == 0 || self.max_stages > STAGE_CEILING {
            return Err(DisperserError::InvalidConfig(format!(
                "max_stages must be in 1..={STAGE_CEILING}, got {}",
                self.max_stages
            )));
        }
        let times = [
            ("crossfade_ms", self.crossfade_ms),
            ("stage_smoothing_ms", self.stage_smoothing_ms),
            ("freq_smoothing_ms", self.freq_smoothing_ms),
            ("shape_smoothing_ms", self.shape_smoothing_ms),
        ];
        for (name, value) in times {
            if !value.is_finite() || value < 0.0 {
                return Err(DisperserError::InvalidConfig(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }
        if !self.stage_hysteresis.is_finite() || !(0.0..0.5).contains(&self.stage_hysteresis) {
            return Err(DisperserError::InvalidConfig(format!(
                "stage_hysteresis must be in [0, 0.5), got {}",
                self.stage_hysteresis
            )));
        }
        if !(1..=MAX_CONTROL_INTERVAL).contains(&self.control_interval) {
            return Err(DisperserError::InvalidConfig(format!(
                "control_interval must be in 1..={MAX_CONTROL_INTERVAL}, got {}",
                self.control_interval
            )));
        }
        Ok(())
    }
}
