//! Fixed-size circular delay line with fractional reads.
//!
//! Shared by the input diffusers, the FDN lines and the shimmer pitch
//! shifter. Storage is allocated once; `write` and the read methods never
//! allocate.

/// Circular buffer holding the most recent `capacity` samples.
#[derive(Debug, Clone)]
pub struct DelayLine {
    data: Vec<f64>,
    write_pos: usize,
}

impl DelayLine {
    /// Create a delay line with given capacity in samples (at least 2).
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0.0; capacity.max(2)],
            write_pos: 0,
        }
    }

    /// Create a delay line sized for `duration_secs` at `sample_rate`.
    pub fn with_duration(duration_secs: f64, sample_rate: f64) -> Self {
        Self::new((duration_secs * sample_rate).ceil() as usize)
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Longest delay (in samples) that `read` can reach.
    pub fn max_delay(&self) -> f64 {
        (self.data.len() - 1) as f64
    }

    /// Index the next `write` will store into.
    pub fn write_pos(&self) -> usize {
        self.write_pos
    }

    /// Write one sample.
    #[inline]
    pub fn write(&mut self, sample: f64) {
        self.data[self.write_pos] = sample;
        self.write_pos += 1;
        if self.write_pos >= self.data.len() {
            self.write_pos = 0;
        }
    }

    /// Read the signal `delay` writes ago; `1.0` is the most recent write.
    ///
    /// Fractional delays interpolate linearly between neighbours. The delay
    /// is clamped to `[1, max_delay]`.
    #[inline]
    pub fn read(&self, delay: f64) -> f64 {
        let len = self.data.len();
        let d = delay.clamp(1.0, self.max_delay());
        let whole = d as usize;
        let frac = d - whole as f64;
        let i0 = (self.write_pos + len - whole) % len;
        if frac == 0.0 {
            return self.data[i0];
        }
        let i1 = if i0 == 0 { len - 1 } else { i0 - 1 };
        self.data[i0] * (1.0 - frac) + self.data[i1] * frac
    }

    /// Read at an absolute (fractional) buffer position, interpolating
    /// towards the following slot. Positions wrap around the capacity.
    #[inline]
    pub fn read_at(&self, position: f64) -> f64 {
        let len = self.data.len();
        let pos = position.rem_euclid(len as f64);
        let i0 = (pos as usize).min(len - 1);
        let frac = pos - i0 as f64;
        let i1 = if i0 + 1 == len { 0 } else { i0 + 1 };
        self.data[i0] * (1.0 - frac) + self.data[i1] * frac
    }

    /// Zero the contents without reallocating.
    pub fn clear(&mut self) {
        self.data.fill(0.0);
        self.write_pos = 0;
    }
}
