//! Lo-fi degradation: sample-and-hold rate reduction + bit crushing.
//!
//! One `amount` drives both curves:
//! rate  -- exponential from the native rate down to a 4 kHz floor.
//! bits  -- linear from 16 down to 4.
//!
//! Above 6 bits a small triangular dither is added after quantization.
//! Each degrader owns its own seeded generator, so two instances never
//! share a random stream and a fixed seed reproduces the output exactly.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Amounts below this leave the signal untouched.
pub const BYPASS_THRESHOLD: f64 = 0.001;
/// Lowest reachable sample-and-hold rate in Hz.
pub const MIN_SAMPLE_RATE: f64 = 4000.0;
pub const MAX_BIT_DEPTH: f64 = 16.0;
pub const MIN_BIT_DEPTH: f64 = 4.0;
/// Dither is only applied above this bit depth.
pub const DITHER_MIN_BITS: f64 = 6.0;
pub const DEFAULT_SEED: u64 = 12345;

/// Sample-and-hold rate for `amount` at `native_rate`.
pub fn target_sample_rate(native_rate: f64, amount: f64) -> f64 {
    let amount = amount.clamp(0.0, 1.0);
    if native_rate <= MIN_SAMPLE_RATE {
        return native_rate;
    }
    (native_rate * (MIN_SAMPLE_RATE / native_rate).powf(amount)).max(MIN_SAMPLE_RATE)
}

/// Effective (fractional) bit depth for `amount`.
pub fn target_bit_depth(amount: f64) -> f64 {
    (MAX_BIT_DEPTH - (MAX_BIT_DEPTH - MIN_BIT_DEPTH) * amount.clamp(0.0, 1.0)).max(MIN_BIT_DEPTH)
}

/// Round to the `2^(bits-1)` grid. Fractional depths give a
/// non-power-of-two grid, which makes the amount sweep continuous.
#[inline]
pub fn quantize(x: f64, bits: f64) -> f64 {
    let scale = 2.0_f64.powf(bits - 1.0);
    (x * scale).round() / scale
}

#[derive(Debug, Clone)]
pub struct LofiDegrader {
    sample_rate: f64,
    amount: f64,
    target_rate: f64,
    bit_depth: f64,
    phase: f64,
    held: f64,
    seed: u64,
    rng: ChaCha8Rng,
}

impl LofiDegrader {
    pub fn new(sample_rate: f64) -> Self {
        Self::with_seed(sample_rate, DEFAULT_SEED)
    }

    pub fn with_seed(sample_rate: f64, seed: u64) -> Self {
        Self {
            sample_rate,
            amount: 0.0,
            target_rate: sample_rate,
            bit_depth: MAX_BIT_DEPTH,
            phase: 0.0,
            held: 0.0,
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn prepare(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
        self.target_rate = target_sample_rate(sample_rate, self.amount);
        self.reset();
    }

    /// Clear the hold state and restart the dither sequence from the seed.
    pub fn reset(&mut self) {
        self.phase = 0.0;
        self.held = 0.0;
        self.rng = ChaCha8Rng::seed_from_u64(self.seed);
    }

    #[inline]
    pub fn set_degrade(&mut self, amount: f64) {
        let amount = amount.clamp(0.0, 1.0);
        if amount == self.amount {
            return;
        }
        self.amount = amount;
        self.target_rate = target_sample_rate(self.sample_rate, amount);
        self.bit_depth = target_bit_depth(amount);
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn target_rate(&self) -> f64 {
        self.target_rate
    }

    pub fn bit_depth(&self) -> f64 {
        self.bit_depth
    }

    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        if self.amount < BYPASS_THRESHOLD {
            return input;
        }

        self.phase += self.target_rate / self.sample_rate;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
            self.held = self.crush(input);
        }
        self.held
    }

    fn crush(&mut self, x: f64) -> f64 {
        let quantized = quantize(x, self.bit_depth);
        if self.bit_depth <= DITHER_MIN_BITS {
            return quantized;
        }
        let step = 1.0 / 2.0_f64.powf(self.bit_depth - 1.0);
        let r1: f64 = self.rng.random();
        let r2: f64 = self.rng.random();
        quantized + (r1 + r2 - 1.0) * step * 0.5
    }
}
