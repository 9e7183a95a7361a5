//! One-pole control smoothing.
//!
//! Every control the audio thread reads passes through a [`SmoothedParam`],
//! so automation and knob moves ramp instead of stepping.

/// Time constant used for every user-facing control.
pub const SMOOTHING_MS: f64 = 50.0;

/// Smoothed parameter with exponential ramp.
#[derive(Debug, Clone)]
pub struct SmoothedParam {
    current: f64,
    target: f64,
    ramp_ms: f64,
    /// Coefficient per sample: `current = current + coeff * (target - current)`
    coeff: f64,
}

impl SmoothedParam {
    /// Create a new smoothed parameter.
    ///
    /// `ramp_ms`: time to reach ~63% of target (one time constant).
    /// `sample_rate`: audio sample rate in Hz.
    pub fn new(initial: f64, ramp_ms: f64, sample_rate: f64) -> Self {
        Self {
            current: initial,
            target: initial,
            ramp_ms,
            coeff: ramp_coeff(ramp_ms, sample_rate),
        }
    }

    /// Set a new target value.
    #[inline]
    pub fn set_target(&mut self, target: f64) {
        self.target = target;
    }

    /// Get next smoothed value (called per sample from audio thread).
    #[inline]
    pub fn next(&mut self) -> f64 {
        self.current += self.coeff * (self.target - self.current);
        self.current
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    /// Snap to target immediately (e.g. on reset).
    pub fn reset(&mut self, value: f64) {
        self.current = value;
        self.target = value;
    }

    /// Check if smoothing is still active.
    pub fn is_smoothing(&self) -> bool {
        (self.current - self.target).abs() > 1e-8
    }

    /// Recompute the per-sample coefficient for a new sample rate,
    /// keeping the ramp time.
    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        self.coeff = ramp_coeff(self.ramp_ms, sample_rate);
    }
}

/// One-pole coefficient for a time constant of `ramp_ms` at `sample_rate`.
/// A ramp shorter than one sample jumps straight to the target.
fn ramp_coeff(ramp_ms: f64, sample_rate: f64) -> f64 {
    let samples = (ramp_ms / 1000.0) * sample_rate;
    if samples <= 1.0 {
        1.0
    } else {
        1.0 - (-1.0_f64 / samples).exp()
    }
}
