//! Triangle wavefolder: gain → fold → cubic soft clip → DC block.

use std::f64::consts::TAU;

pub const BYPASS_THRESHOLD: f64 = 0.001;
/// Pre-gain at full amount.
pub const MAX_FOLD_GAIN: f64 = 8.0;
/// DC blocker corner in Hz.
pub const DC_BLOCK_HZ: f64 = 20.0;
/// Output level compensation.
pub const OUTPUT_GAIN: f64 = 0.7;

/// Pre-gain for `amount`, 1× at 0 and 8× at 1.
pub fn fold_gain(amount: f64) -> f64 {
    MAX_FOLD_GAIN.powf(amount.clamp(0.0, 1.0))
}

/// Triangle fold with period 4: reduce into [-2, 2), then `|2 - |x + 2|| - 1`.
#[inline]
pub fn fold(x: f64) -> f64 {
    let r = (x + 2.0).rem_euclid(4.0) - 2.0;
    (2.0 - (r + 2.0).abs()).abs() - 1.0
}

/// Cubic below unity, asymptotic to ±1 above it.
#[inline]
pub fn soft_clip(x: f64) -> f64 {
    if x > 1.0 {
        1.0 - 1.0 / (x * x + 1.0)
    } else if x < -1.0 {
        -1.0 + 1.0 / (x * x + 1.0)
    } else {
        x - x * x * x / 3.0
    }
}

#[derive(Debug, Clone)]
pub struct Wavefolder {
    amount: f64,
    gain: f64,
    dc_coeff: f64,
    prev_input: f64,
    prev_output: f64,
}

impl Wavefolder {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            amount: 0.0,
            gain: 1.0,
            dc_coeff: dc_block_coeff(sample_rate),
            prev_input: 0.0,
            prev_output: 0.0,
        }
    }

    pub fn prepare(&mut self, sample_rate: f64) {
        self.dc_coeff = dc_block_coeff(sample_rate);
        self.reset();
    }

    pub fn reset(&mut self) {
        self.prev_input = 0.0;
        self.prev_output = 0.0;
    }

    #[inline]
    pub fn set_fold(&mut self, amount: f64) {
        let amount = amount.clamp(0.0, 1.0);
        if amount != self.amount {
            self.amount = amount;
            self.gain = fold_gain(amount);
        }
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn gain(&self) -> f64 {
        self.gain
    }

    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        if self.amount < BYPASS_THRESHOLD {
            return input;
        }
        let shaped = soft_clip(fold(input * self.gain));
        let out = shaped - self.prev_input + self.dc_coeff * self.prev_output;
        self.prev_input = shaped;
        self.prev_output = out;
        out * OUTPUT_GAIN
    }
}

fn dc_block_coeff(sample_rate: f64) -> f64 {
    1.0 / (1.0 + TAU * DC_BLOCK_HZ / sample_rate.max(1.0))
}
