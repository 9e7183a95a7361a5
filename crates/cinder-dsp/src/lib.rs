//! Destructive shimmer reverb DSP engine.
//!
//! An 8-line feedback delay network with an octave-up pitch shifter in its
//! feedback path, wrapped in lo-fi degrade and wavefold stages that can sit
//! before or after the reverb.
//!
//! Single entry point for hosts: [`SignalRouter::process_block`].

pub mod controls;
pub mod delay;
pub mod diffuser;
pub mod envelope;
pub mod error;
pub mod fdn;
pub mod fold;
pub mod hadamard;
pub mod lofi;
pub mod pitch;
pub mod preset;
pub mod reverb;
pub mod router;
pub mod smoothing;
pub mod telemetry;

pub use controls::{CinderParams, ControlFrame, ControlId, SharedControls};
pub use error::{Error, Result};
pub use fold::Wavefolder;
pub use lofi::LofiDegrader;
pub use preset::Preset;
pub use reverb::{ReverbParameters, ShimmerReverb};
pub use router::{Capabilities, SignalRouter};
pub use telemetry::{Telemetry, TelemetrySnapshot};
