//! Level telemetry published by the audio thread once per block.
//!
//! [`BlockMeter`] accumulates on the audio thread without touching any
//! shared state; [`BlockMeter::publish`] stores the results into
//! [`Telemetry`] with relaxed atomic stores, and any other thread may read
//! them at any time. Readings are at most one block stale.

use std::sync::atomic::Ordering;

use atomic_float::AtomicF32;

/// Floor used when converting silence to decibels.
pub const SILENCE_DB: f64 = -120.0;

pub fn gain_to_db(gain: f64) -> f64 {
    if gain <= 0.0 {
        SILENCE_DB
    } else {
        (20.0 * gain.log10()).max(SILENCE_DB)
    }
}

/// Shared readings, linear gain.
#[derive(Debug, Default)]
pub struct Telemetry {
    reverb_level: AtomicF32,
    output_rms: AtomicF32,
    output_peak: AtomicF32,
}

impl Telemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Peak of the wet signal over the last block.
    pub fn reverb_level(&self) -> f64 {
        self.reverb_level.load(Ordering::Relaxed) as f64
    }

    /// RMS of the mono output over the last block.
    pub fn output_rms(&self) -> f64 {
        self.output_rms.load(Ordering::Relaxed) as f64
    }

    /// Peak of the mono output over the last block.
    pub fn output_peak(&self) -> f64 {
        self.output_peak.load(Ordering::Relaxed) as f64
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            reverb_level: self.reverb_level(),
            output_rms: self.output_rms(),
            output_peak: self.output_peak(),
        }
    }

    pub fn clear(&self) {
        self.reverb_level.store(0.0, Ordering::Relaxed);
        self.output_rms.store(0.0, Ordering::Relaxed);
        self.output_peak.store(0.0, Ordering::Relaxed);
    }
}

/// Point-in-time telemetry reading.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TelemetrySnapshot {
    pub reverb_level: f64,
    pub output_rms: f64,
    pub output_peak: f64,
}

impl TelemetrySnapshot {
    pub fn rms_db(&self) -> f64 {
        gain_to_db(self.output_rms)
    }

    pub fn peak_db(&self) -> f64 {
        gain_to_db(self.output_peak)
    }
}

/// Per-block accumulator owned by the audio thread.
#[derive(Debug, Clone, Default)]
pub struct BlockMeter {
    wet_peak: f64,
    sum_sq: f64,
    peak: f64,
    count: usize,
}

impl BlockMeter {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn push(&mut self, wet: f64, out_l: f64, out_r: f64) {
        let mono = 0.5 * (out_l + out_r);
        self.wet_peak = self.wet_peak.max(wet.abs());
        self.sum_sq += mono * mono;
        self.peak = self.peak.max(mono.abs());
        self.count += 1;
    }

    pub fn rms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            (self.sum_sq / self.count as f64).sqrt()
        }
    }

    pub fn peak(&self) -> f64 {
        self.peak
    }

    /// Store the block's readings and start a new block. An empty block
    /// publishes nothing.
    #[inline]
    pub fn publish(&mut self, telemetry: &Telemetry) {
        if self.count == 0 {
            return;
        }
        telemetry
            .reverb_level
            .store(self.wet_peak as f32, Ordering::Relaxed);
        telemetry.output_rms.store(self.rms() as f32, Ordering::Relaxed);
        telemetry.output_peak.store(self.peak as f32, Ordering::Relaxed);
        self.reset();
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
