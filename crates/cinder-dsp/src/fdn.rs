//! Eight-line feedback delay network.
//!
//! Per sample the network is driven in four steps by the shimmer reverb:
//! [`FdnCore::read_taps`] → [`FdnCore::feedback`] → (pitch shift outside) →
//! [`FdnCore::write_back`]. Every value that re-enters a line has passed a
//! soft limiter, and the loop gain is capped below unity, so the network is
//! bounded for any parameter combination.

use crate::delay::DelayLine;
use crate::hadamard::{self, LINES};

/// Base line lengths in milliseconds (prime-ish spread for inharmonic density).
pub const BASE_DELAYS_MS: [f64; LINES] = [35.3, 36.7, 33.8, 32.3, 29.0, 30.8, 27.0, 25.3];
/// Buffer size as a multiple of the base delay, leaving room for size modulation.
const DELAY_HEADROOM: usize = 4;

/// Level above which the soft limiter starts bending.
pub const SOFT_LIMIT_THRESHOLD: f64 = 0.8;
/// Only the first half of the lines receive the pitch-shifted signal.
pub const SHIMMER_LINES: usize = 4;
/// Output normalization for the eight summed taps.
pub const OUTPUT_SCALE: f64 = 0.25;

/// Identity below the threshold, tanh saturation above it.
/// The output magnitude never exceeds 1.0.
#[inline]
pub fn soft_limit(x: f64) -> f64 {
    let mag = x.abs();
    if mag < SOFT_LIMIT_THRESHOLD {
        return x;
    }
    let excess = mag - SOFT_LIMIT_THRESHOLD;
    let limited = SOFT_LIMIT_THRESHOLD + (1.0 - SOFT_LIMIT_THRESHOLD) * (excess * 2.0).tanh();
    limited.copysign(x)
}

/// Derived loop coefficients, recomputed only when the reverb parameters change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopCoefficients {
    /// `feedback_gain * shimmer_compensation`
    pub loop_gain: f64,
    pub damping: f64,
    /// Blend towards `tanh` applied after damping. 0 disables it.
    pub burn: f64,
    /// Line-length multiplier, `0.5 + room_size`.
    pub size_scale: f64,
}

impl Default for LoopCoefficients {
    fn default() -> Self {
        Self {
            loop_gain: 0.85,
            damping: 0.4,
            burn: 0.0,
            size_scale: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FdnCore {
    lines: [DelayLine; LINES],
    base_delays: [f64; LINES],
    damping_state: [f64; LINES],
}

impl FdnCore {
    pub fn new(sample_rate: f64) -> Self {
        let base_delays = BASE_DELAYS_MS.map(|ms| (ms * sample_rate / 1000.0).floor().max(1.0));
        Self {
            lines: base_delays.map(|d| DelayLine::new(d as usize * DELAY_HEADROOM)),
            base_delays,
            damping_state: [0.0; LINES],
        }
    }

    /// Base delay of each line in samples.
    pub fn base_delays(&self) -> &[f64; LINES] {
        &self.base_delays
    }

    /// Read every line at its room-size-scaled length.
    #[inline]
    pub fn read_taps(&self, size_scale: f64) -> [f64; LINES] {
        let mut taps = [0.0; LINES];
        for (i, tap) in taps.iter_mut().enumerate() {
            *tap = self.lines[i].read(self.base_delays[i] * size_scale);
        }
        taps
    }

    /// Hadamard mix, one-pole damping, optional burn saturation, soft
    /// limiting and loop gain.
    #[inline]
    pub fn feedback(&mut self, taps: &[f64; LINES], coeffs: &LoopCoefficients) -> [f64; LINES] {
        let mut mixed = hadamard::mix(taps);
        for (i, v) in mixed.iter_mut().enumerate() {
            let state = &mut self.damping_state[i];
            *state += coeffs.damping * (*v - *state);
            let mut x = *state;
            if coeffs.burn > 0.0 {
                x = (1.0 - coeffs.burn) * x + coeffs.burn * x.tanh();
            }
            *v = soft_limit(x) * coeffs.loop_gain;
        }
        mixed
    }

    /// Add the per-line input share and the shimmer contribution, limit, and
    /// write into the lines.
    #[inline]
    pub fn write_back(&mut self, fed: &[f64; LINES], input_share: f64, shimmer: f64) {
        for (i, line) in self.lines.iter_mut().enumerate() {
            let shimmer_contrib = if i < SHIMMER_LINES { shimmer } else { 0.0 };
            line.write(soft_limit(fed[i] + input_share + shimmer_contrib));
        }
    }

    pub fn reset(&mut self) {
        for line in self.lines.iter_mut() {
            line.clear();
        }
        self.damping_state = [0.0; LINES];
    }
}

/// Sum of the pre-feedback taps, normalized.
#[inline]
pub fn output(taps: &[f64; LINES]) -> f64 {
    taps.iter().sum::<f64>() * OUTPUT_SCALE
}
