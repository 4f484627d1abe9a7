//! Reverse overlap-add pipeline
//!
//! Produces the "reversed dispersion" effect: live input is cut into 50%
//! overlapping frames, each frame is windowed, flipped in time, pushed through
//! the stage chain, windowed again and overlap-added back into a continuous
//! output stream.
//!
//! ```text
//! input ──► ring[W] ──(every hop)──► window ─► reverse ─► network ─► window ─┐
//!                                                                            ▼
//! output ◄──────────────────────────── pop ◄──────────────── ola ring[2W] (+=)
//! ```
//!
//! Latency is one window length. All buffers are sized once for the largest
//! window the engine can ask for; `configure` only changes the active length.

use disperser_core::{MAX_CHANNELS, MAX_SAFE_SAMPLES, Sample};

use crate::window::fill_sqrt_hann;

/// Shortest window (stage count 0)
pub const MIN_WINDOW_MS: f64 = 5.0;
/// Added on top of the shortest window at full stage count
pub const WINDOW_RANGE_MS: f64 = 245.0;
/// Curve applied to the normalized stage count
pub const WINDOW_CURVE: f64 = 0.70;
/// Floor for the window length in samples
pub const MIN_WINDOW_SAMPLES: usize = 16;

/// Window duration for a normalized stage amount
#[inline]
pub fn window_length_ms(amount_norm: f64) -> f64 {
    let amount = if amount_norm.is_finite() { amount_norm.clamp(0.0, 1.0) } else { 0.0 };
    MIN_WINDOW_MS + WINDOW_RANGE_MS * amount.powf(WINDOW_CURVE)
}

/// Window length in samples for a stage count.
///
/// Always even (so the hop divides it exactly) and clamped to
/// `[MIN_WINDOW_SAMPLES, MAX_SAFE_SAMPLES]`.
pub fn window_length_samples(stages: usize, max_stages: usize, sample_rate: f64) -> usize {
    let amount = stages as f64 / max_stages.max(1) as f64;
    let samples = window_length_ms(amount) * 0.001 * sample_rate;
    let half = (0.5 * samples).round();
    if !half.is_finite() || half < (MIN_WINDOW_SAMPLES / 2) as f64 {
        return MIN_WINDOW_SAMPLES;
    }
    ((half as usize).saturating_mul(2)).min(MAX_SAFE_SAMPLES)
}

/// Frame scheduling state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OlaPhase {
    /// At a hop boundary, nothing buffered toward the next frame
    #[default]
    Idle,
    /// Part of a hop has been collected
    Accumulating,
    /// A full hop arrived; the next frame must be rendered
    FrameReady,
}

/// Per-engine reverse overlap-add state
#[derive(Debug, Clone)]
pub struct ReversePipeline {
    capacity: usize,
    window_len: usize,
    hop: usize,
    window: Vec<Sample>,
    input: [Vec<Sample>; MAX_CHANNELS],
    ola: [Vec<Sample>; MAX_CHANNELS],
    frame: Vec<Sample>,
    input_pos: usize,
    read_pos: usize,
    write_pos: usize,
    hop_count: usize,
    phase: OlaPhase,
    frames_rendered: u64,
}

impl ReversePipeline {
    /// Allocate for windows up to `max_window` samples
    pub fn with_capacity(max_window: usize) -> Self {
        let capacity = even_floor(max_window.clamp(MIN_WINDOW_SAMPLES, MAX_SAFE_SAMPLES));
        let mut pipeline = Self {
            capacity,
            window_len: capacity,
            hop: capacity / 2,
            window: vec![0.0; capacity],
            input: std::array::from_fn(|_| vec![0.0; capacity]),
            ola: std::array::from_fn(|_| vec![0.0; capacity * 2]),
            frame: vec![0.0; capacity],
            input_pos: 0,
            read_pos: 0,
            write_pos: 0,
            hop_count: 0,
            phase: OlaPhase::Idle,
            frames_rendered: 0,
        };
        pipeline.reset();
        pipeline
    }

    /// Select the active window length (clamped to capacity, forced even) and reset
    pub fn configure(&mut self, window_len: usize) {
        self.window_len = even_floor(window_len.clamp(MIN_WINDOW_SAMPLES, self.capacity));
        self.hop = self.window_len / 2;
        self.reset();
    }

    /// Clear both rings, rewind all cursors and rebuild the window table.
    ///
    /// Must not be called while a frame is being rendered; the engine only
    /// calls it at topology boundaries.
    pub fn reset(&mut self) {
        let w = self.window_len;
        fill_sqrt_hann(&mut self.window[..w]);
        for ring in &mut self.input {
            ring[..w].fill(0.0);
        }
        for ring in &mut self.ola {
            ring[..2 * w].fill(0.0);
        }
        self.frame[..w].fill(0.0);
        self.input_pos = 0;
        self.read_pos = 0;
        self.write_pos = 0;
        self.hop_count = 0;
        self.phase = OlaPhase::Idle;
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn window_len(&self) -> usize {
        self.window_len
    }

    #[inline]
    pub fn hop(&self) -> usize {
        self.hop
    }

    #[inline]
    pub fn phase(&self) -> OlaPhase {
        self.phase
    }

    /// Inherent delay of the pipeline in samples, measured at the frame center.
    ///
    /// The leading edge of an impulse reaches the output one sample earlier (`W - 1`).
    #[inline]
    pub fn latency(&self) -> usize {
        self.window_len
    }

    #[inline]
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Store one input sample of `channel` and pop its output sample.
    ///
    /// Call once per channel, then [`ReversePipeline::advance`] once.
    #[inline]
    pub fn push(&mut self, channel: usize, x: Sample) -> Sample {
        let slot = &mut self.ola[channel][self.read_pos];
        let y = *slot;
        *slot = 0.0;
        self.input[channel][self.input_pos] = x;
        y
    }

    /// Move every cursor one sample forward. Returns `true` when a frame is ready.
    #[inline]
    pub fn advance(&mut self) -> bool {
        self.input_pos += 1;
        if self.input_pos == self.window_len {
            self.input_pos = 0;
        }
        self.read_pos += 1;
        if self.read_pos == 2 * self.window_len {
            self.read_pos = 0;
        }
        self.hop_count += 1;
        if self.hop_count >= self.hop {
            self.hop_count = 0;
            self.phase = OlaPhase::FrameReady;
            true
        } else {
            self.phase = OlaPhase::Accumulating;
            false
        }
    }

    /// Render the pending frame for the first `channels` channels.
    ///
    /// `filter(channel, frame)` receives the windowed, time-reversed frame and
    /// processes it in place. Does nothing unless a frame is ready.
    pub fn render_frame<F>(&mut self, channels: usize, mut filter: F)
    where
        F: FnMut(usize, &mut [Sample]),
    {
        if self.phase != OlaPhase::FrameReady {
            return;
        }

        let w = self.window_len;
        let ola_len = 2 * w;
        self.write_pos = (self.write_pos + self.hop) % ola_len;
        debug_assert_eq!(self.write_pos, self.read_pos);

        let window = &self.window[..w];
        let frame = &mut self.frame[..w];

        for ch in 0..channels.min(MAX_CHANNELS) {
            // Oldest sample sits at the input cursor
            let ring = &self.input[ch][..w];
            let (newer, older) = ring.split_at(self.input_pos);
            let (head, tail) = frame.split_at_mut(older.len());
            head.copy_from_slice(older);
            tail.copy_from_slice(newer);

            for (s, &g) in frame.iter_mut().zip(window) {
                *s *= g;
            }
            frame.reverse();

            filter(ch, &mut *frame);

            let ola = &mut self.ola[ch][..ola_len];
            let first = (ola_len - self.write_pos).min(w);
            for (k, (&s, &g)) in frame.iter().zip(window).enumerate() {
                let idx = if k < first { self.write_pos + k } else { k - first };
                ola[idx] += s * g;
            }
        }

        self.frames_rendered += 1;
        self.phase = OlaPhase::Idle;
    }
}

#[inline]
fn even_floor(n: usize) -> usize {
    n & !1
}
