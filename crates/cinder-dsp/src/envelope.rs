//! Asymmetric peak envelope follower used for sidechain ducking.

/// Attack time of the ducking sidechain.
pub const ATTACK_MS: f64 = 0.5;
/// Release time of the ducking sidechain.
pub const RELEASE_MS: f64 = 150.0;

/// One-pole peak follower with separate attack and release coefficients.
///
/// `state = c * state + (1 - c) * level`, where `c` is the attack
/// coefficient while the level rises above the state and the release
/// coefficient otherwise.
#[derive(Debug, Clone)]
pub struct EnvelopeFollower {
    state: f64,
    attack_ms: f64,
    release_ms: f64,
    attack_coeff: f64,
    release_coeff: f64,
}

impl EnvelopeFollower {
    pub fn new(sample_rate: f64) -> Self {
        Self::with_times(ATTACK_MS, RELEASE_MS, sample_rate)
    }

    pub fn with_times(attack_ms: f64, release_ms: f64, sample_rate: f64) -> Self {
        Self {
            state: 0.0,
            attack_ms,
            release_ms,
            attack_coeff: one_pole_coeff(attack_ms, sample_rate),
            release_coeff: one_pole_coeff(release_ms, sample_rate),
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        self.attack_coeff = one_pole_coeff(self.attack_ms, sample_rate);
        self.release_coeff = one_pole_coeff(self.release_ms, sample_rate);
    }

    /// Feed one rectified level and return the updated envelope.
    #[inline]
    pub fn process(&mut self, level: f64) -> f64 {
        let c = if level > self.state {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.state = c * self.state + (1.0 - c) * level;
        self.state
    }

    pub fn value(&self) -> f64 {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = 0.0;
    }
}

/// `exp(-1 / (t * sr))`; zero (instant) for non-positive times.
fn one_pole_coeff(time_ms: f64, sample_rate: f64) -> f64 {
    let samples = time_ms * 0.001 * sample_rate;
    if samples <= 0.0 {
        0.0
    } else {
        (-1.0 / samples).exp()
    }
}
