//! Fixed-ratio granular pitch shifter for the shimmer feedback path.
//!
//! Writes at one sample per call and reads the same buffer at twice that
//! speed, so the read cursor replays recent history an octave up. A
//! raised-cosine window keyed to a 512-sample grain hides the seam where
//! the fast cursor laps the writer. The resulting slight warble is part of
//! the shimmer sound.

use std::f64::consts::TAU;

use crate::delay::DelayLine;

/// Octave up.
pub const PITCH_RATIO: f64 = 2.0;
/// Grain length of the crossfade window, in read positions.
pub const GRAIN_SIZE: usize = 512;
/// History kept by the shifter.
pub const BUFFER_SECONDS: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct PitchShifter {
    buffer: DelayLine,
    read_pos: f64,
}

impl PitchShifter {
    pub fn new(sample_rate: f64) -> Self {
        let capacity = ((sample_rate * BUFFER_SECONDS) as usize).max(GRAIN_SIZE * 2);
        Self {
            buffer: DelayLine::new(capacity),
            read_pos: 0.0,
        }
    }

    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        self.buffer.write(input);

        let len = self.buffer.capacity() as f64;
        self.read_pos += PITCH_RATIO;
        if self.read_pos >= len {
            self.read_pos -= len;
        }

        let sample = self.buffer.read_at(self.read_pos);
        let grain_pos = (self.read_pos as usize % GRAIN_SIZE) as f64;
        let window = 0.5 - 0.5 * (TAU * grain_pos / GRAIN_SIZE as f64).cos();
        sample * window
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.read_pos = 0.0;
    }
}
