//! Shimmer reverb: input diffusion → FDN ⇄ octave-up pitch shifter.
//!
//! `process` advances the whole network by exactly one sample and is the
//! only per-sample entry point. `set_parameters` only recomputes the
//! derived loop coefficients and never touches the signal state.

use crate::diffuser::InputDiffuser;
use crate::fdn::{self, FdnCore, LoopCoefficients};
use crate::hadamard::LINES;
use crate::pitch::PitchShifter;

/// Decay values at or above this many seconds select infinite mode.
pub const INFINITE_DECAY_THRESHOLD: f64 = 29.5;
/// Near-unity loop gain reserved for infinite mode.
pub const INFINITE_FEEDBACK_GAIN: f64 = 0.9998;
/// Hard cap on the RT60-derived feedback gain.
pub const MAX_FEEDBACK_GAIN: f64 = 0.985;
/// Shortest decay accepted by the RT60 formula.
pub const MIN_DECAY_SECONDS: f64 = 0.01;
/// Average loop time used to turn RT60 into a per-pass gain.
pub const AVERAGE_LOOP_SECONDS: f64 = 0.030;

/// Fraction of the pitch-shifted signal fed back per unit of shimmer.
const SHIMMER_INJECTION: f64 = 0.25;
/// Loop gain reduction per unit of shimmer.
const SHIMMER_COMPENSATION: f64 = 0.15;

/// Host-facing reverb controls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReverbParameters {
    /// RT60 in seconds, 0.1–30. At or above 29.5 the tail is held.
    pub decay_seconds: f64,
    /// 0–1
    pub shimmer: f64,
    /// 0–1
    pub room_size: f64,
    /// In-loop saturation, 0–1. Zero outside the burn variant.
    pub burn: f64,
    /// Hold the current tail and stop accepting new input.
    pub freeze: bool,
}

impl Default for ReverbParameters {
    fn default() -> Self {
        Self {
            decay_seconds: 2.0,
            shimmer: 0.0,
            room_size: 0.5,
            burn: 0.0,
            freeze: false,
        }
    }
}

impl ReverbParameters {
    pub fn new(decay_seconds: f64, shimmer: f64, room_size: f64) -> Self {
        Self {
            decay_seconds,
            shimmer,
            room_size,
            ..Self::default()
        }
    }

    pub fn with_burn(mut self, burn: f64) -> Self {
        self.burn = burn;
        self
    }

    pub fn with_freeze(mut self, freeze: bool) -> Self {
        self.freeze = freeze;
        self
    }

    pub fn is_infinite(&self) -> bool {
        self.freeze || self.decay_seconds >= INFINITE_DECAY_THRESHOLD
    }

    pub fn feedback_gain(&self) -> f64 {
        if self.is_infinite() {
            INFINITE_FEEDBACK_GAIN
        } else {
            feedback_gain_for_decay(self.decay_seconds)
        }
    }

    /// One-pole damping coefficient; larger rooms are brighter.
    /// Infinite mode bypasses damping so a held tail does not darken.
    pub fn damping_coeff(&self) -> f64 {
        if self.is_infinite() {
            1.0
        } else {
            0.2 + self.room_size.clamp(0.0, 1.0) * 0.4
        }
    }

    /// Offsets the energy injected by the shimmer path.
    pub fn shimmer_compensation(&self) -> f64 {
        1.0 - self.shimmer.clamp(0.0, 1.0) * SHIMMER_COMPENSATION
    }

    pub fn loop_coefficients(&self) -> LoopCoefficients {
        LoopCoefficients {
            loop_gain: self.feedback_gain() * self.shimmer_compensation(),
            damping: self.damping_coeff(),
            burn: self.burn.clamp(0.0, 1.0),
            size_scale: 0.5 + self.room_size.clamp(0.0, 1.0),
        }
    }
}

/// RT60 law, `10^(-3 * loop / decay)`, capped at [`MAX_FEEDBACK_GAIN`].
pub fn feedback_gain_for_decay(decay_seconds: f64) -> f64 {
    let decay = decay_seconds.max(MIN_DECAY_SECONDS);
    10.0_f64
        .powf(-3.0 * AVERAGE_LOOP_SECONDS / decay)
        .clamp(0.0, MAX_FEEDBACK_GAIN)
}

/// Decay rate in dB per second implied by a per-loop gain.
pub fn decay_rate_db_per_second(gain: f64) -> f64 {
    -20.0 * gain.max(f64::MIN_POSITIVE).log10() / AVERAGE_LOOP_SECONDS
}

#[derive(Debug, Clone)]
pub struct ShimmerReverb {
    sample_rate: f64,
    diffuser: InputDiffuser,
    fdn: FdnCore,
    shifter: PitchShifter,
    params: ReverbParameters,
    coeffs: LoopCoefficients,
}

impl ShimmerReverb {
    pub fn new(sample_rate: f64) -> Self {
        let params = ReverbParameters::default();
        Self {
            sample_rate,
            diffuser: InputDiffuser::new(sample_rate),
            fdn: FdnCore::new(sample_rate),
            shifter: PitchShifter::new(sample_rate),
            coeffs: params.loop_coefficients(),
            params,
        }
    }

    /// Reallocate every buffer for a new sample rate. The current
    /// parameters are kept.
    pub fn prepare(&mut self, sample_rate: f64, max_block_size: usize) {
        self.sample_rate = sample_rate;
        self.diffuser = InputDiffuser::new(sample_rate);
        self.fdn = FdnCore::new(sample_rate);
        self.shifter = PitchShifter::new(sample_rate);
        log::debug!(
            "shimmer reverb prepared: {sample_rate} Hz, block {max_block_size}, base delays {:?}",
            self.fdn.base_delays()
        );
    }

    pub fn reset(&mut self) {
        self.diffuser.reset();
        self.fdn.reset();
        self.shifter.reset();
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn parameters(&self) -> &ReverbParameters {
        &self.params
    }

    pub fn loop_coefficients(&self) -> &LoopCoefficients {
        &self.coeffs
    }

    #[inline]
    pub fn set_parameters(&mut self, params: &ReverbParameters) {
        if *params == self.params {
            return;
        }
        self.params = *params;
        self.coeffs = params.loop_coefficients();
    }

    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        let input = if self.params.freeze { 0.0 } else { input };
        let diffused = self.diffuser.process(input);

        let taps = self.fdn.read_taps(self.coeffs.size_scale);
        let fed = self.fdn.feedback(&taps, &self.coeffs);

        let shifted = self.shifter.process(fed[0]);
        let shimmer = shifted * self.params.shimmer * SHIMMER_INJECTION;

        self.fdn
            .write_back(&fed, diffused / LINES as f64, shimmer);

        fdn::output(&taps)
    }
}
