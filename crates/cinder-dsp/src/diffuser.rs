//! Input diffusion: four chained all-pass stages that smear transients
//! before they enter the delay network.

use crate::delay::DelayLine;

/// Per-stage delay times in milliseconds.
pub const DIFFUSER_DELAYS_MS: [f64; 4] = [4.2, 3.6, 2.9, 2.3];
/// All-pass coefficient shared by every stage.
pub const DIFFUSION_GAIN: f64 = 0.6;

/// Schroeder all-pass: `v = x + g*d`, `y = d - g*v` with `d = v[n - D]`.
#[derive(Debug, Clone)]
struct AllpassStage {
    line: DelayLine,
    delay: f64,
}

impl AllpassStage {
    fn new(delay_ms: f64, sample_rate: f64) -> Self {
        let delay = (delay_ms * 0.001 * sample_rate).round().max(1.0);
        Self {
            line: DelayLine::new(delay as usize + 2),
            delay,
        }
    }

    #[inline]
    fn process(&mut self, x: f64, g: f64) -> f64 {
        let delayed = self.line.read(self.delay);
        let v = x + g * delayed;
        self.line.write(v);
        delayed - g * v
    }
}

/// Serial chain of the four diffusion stages. No parameter dependence.
#[derive(Debug, Clone)]
pub struct InputDiffuser {
    stages: [AllpassStage; 4],
}

impl InputDiffuser {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            stages: DIFFUSER_DELAYS_MS.map(|ms| AllpassStage::new(ms, sample_rate)),
        }
    }

    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        let mut diffused = input;
        for stage in self.stages.iter_mut() {
            diffused = stage.process(diffused, DIFFUSION_GAIN);
        }
        diffused
    }

    pub fn reset(&mut self) {
        for stage in self.stages.iter_mut() {
            stage.line.clear();
        }
    }
}
