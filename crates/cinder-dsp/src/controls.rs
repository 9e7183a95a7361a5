//! Control surface for the destructive reverb.
//!
//! Every caller (CLI, presets, a host wrapper) goes through the same closed
//! set of [`ControlId`]s. The control thread writes raw values into
//! [`SharedControls`]; the audio thread reads them once per sample through
//! [`SmoothedControls`], so the DSP chain never sees an unsmoothed value.

use std::str::FromStr;
use std::sync::atomic::Ordering;

use atomic_float::AtomicF32;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::smoothing::{SmoothedParam, SMOOTHING_MS};

pub const NUM_CONTROLS: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlId {
    Decay,
    Shimmer,
    Size,
    Degrade,
    Fold,
    Dirt,
    Pre,
    Duck,
    Mix,
    Drive,
    Burn,
    Freeze,
}

impl ControlId {
    pub const ALL: [ControlId; NUM_CONTROLS] = [
        ControlId::Decay,
        ControlId::Shimmer,
        ControlId::Size,
        ControlId::Degrade,
        ControlId::Fold,
        ControlId::Dirt,
        ControlId::Pre,
        ControlId::Duck,
        ControlId::Mix,
        ControlId::Drive,
        ControlId::Burn,
        ControlId::Freeze,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Key used in preset JSON and on the command line.
    pub fn key(self) -> &'static str {
        match self {
            ControlId::Decay => "decay",
            ControlId::Shimmer => "shimmer",
            ControlId::Size => "size",
            ControlId::Degrade => "degrade",
            ControlId::Fold => "fold",
            ControlId::Dirt => "dirt",
            ControlId::Pre => "pre",
            ControlId::Duck => "duck",
            ControlId::Mix => "mix",
            ControlId::Drive => "drive",
            ControlId::Burn => "burn",
            ControlId::Freeze => "freeze",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ControlId::Decay => "Decay",
            ControlId::Shimmer => "Shimmer",
            ControlId::Size => "Size",
            ControlId::Degrade => "Degrade",
            ControlId::Fold => "Fold",
            ControlId::Dirt => "Dirt",
            ControlId::Pre => "Pre/Post",
            ControlId::Duck => "Duck",
            ControlId::Mix => "Mix",
            ControlId::Drive => "Drive",
            ControlId::Burn => "Burn",
            ControlId::Freeze => "Freeze",
        }
    }

    /// Declared (min, max).
    pub fn range(self) -> (f64, f64) {
        match self {
            ControlId::Decay => (0.1, 30.0),
            _ => (0.0, 1.0),
        }
    }

    pub fn default_value(self) -> f64 {
        match self {
            ControlId::Decay => 2.0,
            ControlId::Dirt | ControlId::Size => 0.5,
            ControlId::Mix => 0.3,
            _ => 0.0,
        }
    }

    #[inline]
    pub fn clamp(self, value: f64) -> f64 {
        let (lo, hi) = self.range();
        value.clamp(lo, hi)
    }

    pub fn from_key(key: &str) -> Option<ControlId> {
        ControlId::ALL.into_iter().find(|id| id.key() == key)
    }
}

impl FromStr for ControlId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ControlId::from_key(&s.trim().to_ascii_lowercase())
            .ok_or_else(|| Error::UnknownControl(s.to_string()))
    }
}

/// Parameter ranges by key (min, max).
pub fn param_range(key: &str) -> Option<(f64, f64)> {
    ControlId::from_key(key).map(ControlId::range)
}

/// Raw control values shared between the control and audio threads.
///
/// One atomic scalar per control, relaxed loads and stores only.
#[derive(Debug)]
pub struct SharedControls {
    values: [AtomicF32; NUM_CONTROLS],
}

impl Default for SharedControls {
    fn default() -> Self {
        Self {
            values: ControlId::ALL.map(|id| AtomicF32::new(id.default_value() as f32)),
        }
    }
}

impl SharedControls {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn get(&self, id: ControlId) -> f64 {
        self.values[id.index()].load(Ordering::Relaxed) as f64
    }

    #[inline]
    pub fn set(&self, id: ControlId, value: f64) {
        self.values[id.index()].store(value as f32, Ordering::Relaxed);
    }
}

/// Smoothed control values for one sample, clamped to their ranges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlFrame {
    pub decay: f64,
    pub shimmer: f64,
    pub size: f64,
    pub degrade: f64,
    pub fold: f64,
    pub dirt: f64,
    pub pre: f64,
    pub duck: f64,
    pub mix: f64,
    pub drive: f64,
    pub burn: f64,
    pub freeze: f64,
}

impl Default for ControlFrame {
    fn default() -> Self {
        CinderParams::default().frame()
    }
}

impl ControlFrame {
    pub fn is_frozen(&self) -> bool {
        self.freeze > 0.5
    }
}

/// One [`SmoothedParam`] per control.
#[derive(Debug, Clone)]
pub struct SmoothedControls {
    params: [SmoothedParam; NUM_CONTROLS],
}

impl SmoothedControls {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            params: ControlId::ALL
                .map(|id| SmoothedParam::new(id.default_value(), SMOOTHING_MS, sample_rate)),
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        for p in self.params.iter_mut() {
            p.set_sample_rate(sample_rate);
        }
    }

    /// Jump every ramp to the current raw value.
    pub fn snap(&mut self, controls: &SharedControls) {
        for id in ControlId::ALL {
            self.params[id.index()].reset(id.clamp(controls.get(id)));
        }
    }

    /// Read every raw value, fold it into its ramp and advance one sample.
    #[inline]
    pub fn pull(&mut self, controls: &SharedControls) -> ControlFrame {
        let mut v = [0.0; NUM_CONTROLS];
        for id in ControlId::ALL {
            let p = &mut self.params[id.index()];
            p.set_target(id.clamp(controls.get(id)));
            v[id.index()] = p.next();
        }
        ControlFrame {
            decay: v[0],
            shimmer: v[1],
            size: v[2],
            degrade: v[3],
            fold: v[4],
            dirt: v[5],
            pre: v[6],
            duck: v[7],
            mix: v[8],
            drive: v[9],
            burn: v[10],
            freeze: v[11],
        }
    }
}

/// Snapshot of every control, as stored in presets.
///
/// Uses `#[serde(default)]` so sparse preset JSON loads; missing keys
/// keep their default values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CinderParams {
    pub decay: f64,
    pub shimmer: f64,
    pub size: f64,
    pub degrade: f64,
    pub fold: f64,
    pub dirt: f64,
    pub pre: f64,
    pub duck: f64,
    pub mix: f64,
    pub drive: f64,
    pub burn: f64,
    pub freeze: f64,

    #[serde(rename = "_meta", default, skip_serializing)]
    pub meta: Option<serde_json::Value>,
}

impl Default for CinderParams {
    fn default() -> Self {
        Self {
            decay: ControlId::Decay.default_value(),
            shimmer: 0.0,
            size: ControlId::Size.default_value(),
            degrade: 0.0,
            fold: 0.0,
            dirt: ControlId::Dirt.default_value(),
            pre: 0.0,
            duck: 0.0,
            mix: ControlId::Mix.default_value(),
            drive: 0.0,
            burn: 0.0,
            freeze: 0.0,
            meta: None,
        }
    }
}

impl CinderParams {
    /// Parse from JSON string. Missing fields get default values.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_controls(controls: &SharedControls) -> Self {
        let mut p = Self::default();
        for id in ControlId::ALL {
            p.set(id, controls.get(id));
        }
        p
    }

    pub fn apply_to(&self, controls: &SharedControls) {
        for id in ControlId::ALL {
            controls.set(id, self.get(id));
        }
    }

    pub fn get(&self, id: ControlId) -> f64 {
        match id {
            ControlId::Decay => self.decay,
            ControlId::Shimmer => self.shimmer,
            ControlId::Size => self.size,
            ControlId::Degrade => self.degrade,
            ControlId::Fold => self.fold,
            ControlId::Dirt => self.dirt,
            ControlId::Pre => self.pre,
            ControlId::Duck => self.duck,
            ControlId::Mix => self.mix,
            ControlId::Drive => self.drive,
            ControlId::Burn => self.burn,
            ControlId::Freeze => self.freeze,
        }
    }

    pub fn set(&mut self, id: ControlId, value: f64) {
        let slot = match id {
            ControlId::Decay => &mut self.decay,
            ControlId::Shimmer => &mut self.shimmer,
            ControlId::Size => &mut self.size,
            ControlId::Degrade => &mut self.degrade,
            ControlId::Fold => &mut self.fold,
            ControlId::Dirt => &mut self.dirt,
            ControlId::Pre => &mut self.pre,
            ControlId::Duck => &mut self.duck,
            ControlId::Mix => &mut self.mix,
            ControlId::Drive => &mut self.drive,
            ControlId::Burn => &mut self.burn,
            ControlId::Freeze => &mut self.freeze,
        };
        *slot = value;
    }

    /// Set a control by its string key, e.g. from `--set decay=8`.
    pub fn set_by_key(&mut self, key: &str, value: f64) -> crate::Result<()> {
        let id: ControlId = key.parse()?;
        self.set(id, value);
        Ok(())
    }

    /// Clamp every value into its declared range.
    pub fn normalize(&mut self) {
        for id in ControlId::ALL {
            self.set(id, id.clamp(self.get(id)));
        }
    }

    /// The snapshot as a settled, clamped frame.
    pub fn frame(&self) -> ControlFrame {
        let c = |id: ControlId| id.clamp(self.get(id));
        ControlFrame {
            decay: c(ControlId::Decay),
            shimmer: c(ControlId::Shimmer),
            size: c(ControlId::Size),
            degrade: c(ControlId::Degrade),
            fold: c(ControlId::Fold),
            dirt: c(ControlId::Dirt),
            pre: c(ControlId::Pre),
            duck: c(ControlId::Duck),
            mix: c(ControlId::Mix),
            drive: c(ControlId::Drive),
            burn: c(ControlId::Burn),
            freeze: c(ControlId::Freeze),
        }
    }
}
