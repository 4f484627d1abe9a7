//! Parameter types shared between the control thread and the audio thread

use portable_atomic::{AtomicBool, AtomicF32, AtomicU32, Ordering};
use serde::{Deserialize, Serialize};

use crate::{MAX_FREQ_HZ, MAX_SERIES, MIN_FREQ_HZ};

/// Parameter range specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamRange {
    pub min: f64,
    pub max: f64,
    pub default: f64,
}

impl ParamRange {
    pub const fn new(min: f64, max: f64, default: f64) -> Self {
        Self { min, max, default }
    }

    /// Clamp a plain value into the range. Non-finite values fall back to the default.
    #[inline]
    pub fn clamp(&self, value: f64) -> f64 {
        if value.is_finite() {
            value.clamp(self.min, self.max)
        } else {
            self.default
        }
    }
}

pub const DEFAULT_STAGES: usize = 32;
pub const DEFAULT_SERIES: usize = 1;
pub const DEFAULT_FREQ_HZ: f64 = 1000.0;
pub const DEFAULT_SHAPE: f64 = 0.0;

/// Ranges for every numeric control
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamLayout {
    pub stages: ParamRange,
    pub series: ParamRange,
    pub frequency: ParamRange,
    pub shape: ParamRange,
}

impl ParamLayout {
    pub fn new(max_stages: usize) -> Self {
        Self {
            stages: ParamRange::new(0.0, max_stages as f64, DEFAULT_STAGES.min(max_stages) as f64),
            series: ParamRange::new(1.0, MAX_SERIES as f64, DEFAULT_SERIES as f64),
            frequency: ParamRange::new(MIN_FREQ_HZ, MAX_FREQ_HZ, DEFAULT_FREQ_HZ),
            shape: ParamRange::new(0.0, 1.0, DEFAULT_SHAPE),
        }
    }
}

/// Plain copy of every control, read once at the top of an audio block.
///
/// `shape` already has the lock overrides applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSnapshot {
    pub stages: f64,
    pub series: usize,
    pub frequency: f64,
    pub shape: f64,
    pub reverse: bool,
    pub invert: bool,
}

/// Lock-free parameter store.
///
/// Written from a UI or automation thread, read by the audio thread with
/// relaxed atomic loads. Setters clamp into the layout ranges so the audio
/// thread never sees an out-of-range value.
#[derive(Debug)]
pub struct DisperserParams {
    layout: ParamLayout,
    stages: AtomicF32,
    series: AtomicU32,
    frequency: AtomicF32,
    shape: AtomicF32,
    reverse: AtomicBool,
    invert: AtomicBool,
    shape_lock_min: AtomicBool,
    shape_lock_max: AtomicBool,
}

impl DisperserParams {
    pub fn new(max_stages: usize) -> Self {
        let layout = ParamLayout::new(max_stages);
        Self {
            stages: AtomicF32::new(layout.stages.default as f32),
            series: AtomicU32::new(layout.series.default as u32),
            frequency: AtomicF32::new(layout.frequency.default as f32),
            shape: AtomicF32::new(layout.shape.default as f32),
            reverse: AtomicBool::new(false),
            invert: AtomicBool::new(false),
            shape_lock_min: AtomicBool::new(false),
            shape_lock_max: AtomicBool::new(false),
            layout,
        }
    }

    /// Stage count. Fractional values are accepted (automation ramps) and
    /// resolved to an integer by the orchestrator.
    pub fn set_stages(&self, stages: f64) {
        let value = self.layout.stages.clamp(stages);
        self.stages.store(value as f32, Ordering::Relaxed);
    }

    pub fn set_series(&self, series: usize) {
        let value = self.layout.series.clamp(series as f64).round();
        self.series.store(value as u32, Ordering::Relaxed);
    }

    pub fn set_frequency(&self, hz: f64) {
        let value = self.layout.frequency.clamp(hz);
        self.frequency.store(value as f32, Ordering::Relaxed);
    }

    pub fn set_shape(&self, shape: f64) {
        let value = self.layout.shape.clamp(shape);
        self.shape.store(value as f32, Ordering::Relaxed);
    }

    pub fn set_reverse(&self, enabled: bool) {
        self.reverse.store(enabled, Ordering::Relaxed);
    }

    pub fn set_invert(&self, enabled: bool) {
        self.invert.store(enabled, Ordering::Relaxed);
    }

    /// Force shape to 0 regardless of the shape control
    pub fn set_shape_lock_min(&self, enabled: bool) {
        self.shape_lock_min.store(enabled, Ordering::Relaxed);
    }

    /// Force shape to 1 regardless of the shape control. Wins over the min lock.
    pub fn set_shape_lock_max(&self, enabled: bool) {
        self.shape_lock_max.store(enabled, Ordering::Relaxed);
    }

    #[inline]
    pub fn stages(&self) -> f64 {
        self.stages.load(Ordering::Relaxed) as f64
    }

    #[inline]
    pub fn series(&self) -> usize {
        self.series.load(Ordering::Relaxed) as usize
    }

    #[inline]
    pub fn frequency(&self) -> f64 {
        self.frequency.load(Ordering::Relaxed) as f64
    }

    #[inline]
    pub fn shape(&self) -> f64 {
        self.shape.load(Ordering::Relaxed) as f64
    }

    #[inline]
    pub fn reverse(&self) -> bool {
        self.reverse.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn invert(&self) -> bool {
        self.invert.load(Ordering::Relaxed)
    }

    /// Read every control at once
    pub fn snapshot(&self) -> ParamSnapshot {
        let mut shape = self.shape();
        if self.shape_lock_min.load(Ordering::Relaxed) {
            shape = 0.0;
        }
        if self.shape_lock_max.load(Ordering::Relaxed) {
            shape = 1.0;
        }

        ParamSnapshot {
            stages: self.stages(),
            series: self.series(),
            frequency: self.frequency(),
            shape,
            reverse: self.reverse(),
            invert: self.invert(),
        }
    }
}

impl Default for DisperserParams {
    fn default() -> Self {
        Self::new(crate::DEFAULT_MAX_STAGES)
    }
}
