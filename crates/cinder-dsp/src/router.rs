//! Per-sample orchestration of the whole effect.
//!
//! Order per sample: dry capture → sidechain envelope → pre destruction
//! (degrade → fold, blended by dirt) → optional drive → shimmer reverb →
//! post destruction → pre/post blend → ducking → dry/wet mix → meter.
//! Left and right run through identical, independent channel strips.
//!
//! One router covers every processor variant; a [`Capabilities`] set chosen
//! at construction decides which controls take effect.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use no_denormals::no_denormals;

use crate::controls::{ControlFrame, SharedControls, SmoothedControls};
use crate::envelope::EnvelopeFollower;
use crate::error::Error;
use crate::fold::Wavefolder;
use crate::lofi::{LofiDegrader, DEFAULT_SEED};
use crate::reverb::{ReverbParameters, ShimmerReverb};
use crate::telemetry::{BlockMeter, Telemetry};

/// Below this a blend or amount counts as off.
const ACTIVE_THRESHOLD: f64 = 0.001;
/// Above this the pre/post blend counts as fully pre.
const FULL_PRE_THRESHOLD: f64 = 0.999;
/// Drive gain at full drive.
const MAX_DRIVE_GAIN: f64 = 10.0;
/// Reported tail length in seconds.
pub const TAIL_SECONDS: f64 = 10.0;

pub const DEFAULT_SAMPLE_RATE: f64 = 44100.0;
pub const DEFAULT_MAX_BLOCK: usize = 512;

/// Which optional stages a router honours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Destruction before the reverb, crossfaded by `pre`. Without it the
    /// router only destroys after the reverb.
    pub pre_post_routing: bool,
    /// In-loop saturation via `burn`.
    pub burn_feedback: bool,
    /// Input drive into the reverb via `drive`.
    pub drive: bool,
    /// Sidechain ducking via `duck`.
    pub ducking: bool,
    /// Tail hold via `freeze`.
    pub freeze: bool,
}

impl Capabilities {
    /// Degrade / fold / dirt with pre/post routing and ducking.
    pub const fn dirt() -> Self {
        Self {
            pre_post_routing: true,
            burn_feedback: false,
            drive: false,
            ducking: true,
            freeze: false,
        }
    }

    /// Drive into a saturating feedback loop, with ducking and freeze.
    pub const fn burn() -> Self {
        Self {
            pre_post_routing: false,
            burn_feedback: true,
            drive: true,
            ducking: true,
            freeze: true,
        }
    }

    /// Post-reverb degrade and fold only.
    pub const fn simple() -> Self {
        Self {
            pre_post_routing: false,
            burn_feedback: false,
            drive: false,
            ducking: false,
            freeze: false,
        }
    }

    pub fn name(&self) -> &'static str {
        match *self {
            c if c == Self::dirt() => "dirt",
            c if c == Self::burn() => "burn",
            c if c == Self::simple() => "simple",
            _ => "custom",
        }
    }

    /// Zero every control this variant does not honour.
    #[inline]
    pub fn mask(&self, frame: &mut ControlFrame) {
        if !self.pre_post_routing {
            frame.pre = 0.0;
        }
        if !self.burn_feedback {
            frame.burn = 0.0;
        }
        if !self.drive {
            frame.drive = 0.0;
        }
        if !self.ducking {
            frame.duck = 0.0;
        }
        if !self.freeze {
            frame.freeze = 0.0;
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::dirt()
    }
}

impl FromStr for Capabilities {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dirt" => Ok(Self::dirt()),
            "burn" => Ok(Self::burn()),
            "simple" => Ok(Self::simple()),
            _ => Err(Error::InvalidVariant(s.to_string())),
        }
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// `tanh(x*g) / tanh(g)`, so ±1 still maps to ±1.
#[inline]
pub fn drive_saturate(x: f64, gain: f64) -> f64 {
    (x * gain).tanh() / gain.tanh()
}

#[inline]
pub fn drive_gain(drive: f64) -> f64 {
    1.0 + (MAX_DRIVE_GAIN - 1.0) * drive.clamp(0.0, 1.0)
}

/// Degrade → fold pair used on either side of the reverb.
#[derive(Debug, Clone)]
struct Destroyer {
    lofi: LofiDegrader,
    folder: Wavefolder,
}

impl Destroyer {
    fn new(sample_rate: f64, seed: u64) -> Self {
        Self {
            lofi: LofiDegrader::with_seed(sample_rate, seed),
            folder: Wavefolder::new(sample_rate),
        }
    }

    fn reset(&mut self) {
        self.lofi.reset();
        self.folder.reset();
    }

    #[inline]
    fn process(&mut self, x: f64, frame: &ControlFrame) -> f64 {
        self.lofi.set_degrade(frame.degrade);
        self.folder.set_fold(frame.fold);
        let degraded = self.lofi.process(x);
        let folded = self.folder.process(degraded);
        degraded * (1.0 - frame.dirt) + folded * frame.dirt
    }
}

/// Everything that runs per channel.
#[derive(Debug, Clone)]
struct ChannelStrip {
    pre: Destroyer,
    reverb: ShimmerReverb,
    post: Destroyer,
}

impl ChannelStrip {
    fn new(sample_rate: f64, max_block_size: usize, seed: u64) -> Self {
        let mut reverb = ShimmerReverb::new(sample_rate);
        reverb.prepare(sample_rate, max_block_size);
        Self {
            pre: Destroyer::new(sample_rate, seed),
            reverb,
            post: Destroyer::new(sample_rate, seed.wrapping_add(1)),
        }
    }

    fn reset(&mut self) {
        self.pre.reset();
        self.reverb.reset();
        self.post.reset();
    }

    /// Wet signal before ducking.
    #[inline]
    fn process(&mut self, dry: f64, frame: &ControlFrame, drive: f64) -> f64 {
        let pre = frame.pre;

        let mut pre_destroyed = dry;
        if pre > ACTIVE_THRESHOLD {
            pre_destroyed = self.pre.process(dry, frame);
        }

        let mut reverb_in = dry * (1.0 - pre) + pre_destroyed * pre;
        if frame.drive >= ACTIVE_THRESHOLD {
            reverb_in = drive_saturate(reverb_in, drive);
        }
        let reverb_out = self.reverb.process(reverb_in);

        let mut post_destroyed = reverb_out;
        if pre < FULL_PRE_THRESHOLD {
            post_destroyed = self.post.process(reverb_out, frame);
        }

        post_destroyed * (1.0 - pre) + reverb_out * pre
    }
}

/// The destructive reverb as a host would drive it.
///
/// Controls are read from the shared atomics once per sample and smoothed;
/// telemetry is published once per block. Nothing in the process path
/// allocates, locks or logs.
pub struct SignalRouter {
    caps: Capabilities,
    controls: Arc<SharedControls>,
    telemetry: Arc<Telemetry>,
    smoothed: SmoothedControls,
    envelope: EnvelopeFollower,
    left: ChannelStrip,
    right: ChannelStrip,
    meter: BlockMeter,
    sample_rate: f64,
    max_block_size: usize,
    scratch: Vec<f32>,
}

impl SignalRouter {
    pub fn new(caps: Capabilities, controls: Arc<SharedControls>) -> Self {
        let sample_rate = DEFAULT_SAMPLE_RATE;
        let max_block_size = DEFAULT_MAX_BLOCK;
        let mut smoothed = SmoothedControls::new(sample_rate);
        smoothed.snap(&controls);
        Self {
            caps,
            controls,
            telemetry: Arc::new(Telemetry::new()),
            smoothed,
            envelope: EnvelopeFollower::new(sample_rate),
            left: ChannelStrip::new(sample_rate, max_block_size, DEFAULT_SEED),
            right: ChannelStrip::new(sample_rate, max_block_size, DEFAULT_SEED.wrapping_add(2)),
            meter: BlockMeter::new(),
            sample_rate,
            max_block_size,
            scratch: vec![0.0; max_block_size],
        }
    }

    /// Allocate every buffer for `sample_rate`. Must run before processing
    /// and again whenever the sample rate or maximum block size changes.
    pub fn prepare(&mut self, sample_rate: f64, max_block_size: usize) {
        let max_block_size = max_block_size.max(1);
        self.sample_rate = sample_rate;
        self.max_block_size = max_block_size;
        self.smoothed.set_sample_rate(sample_rate);
        self.smoothed.snap(&self.controls);
        self.envelope = EnvelopeFollower::new(sample_rate);
        self.left = ChannelStrip::new(sample_rate, max_block_size, DEFAULT_SEED);
        self.right = ChannelStrip::new(sample_rate, max_block_size, DEFAULT_SEED.wrapping_add(2));
        self.meter.reset();
        self.scratch = vec![0.0; max_block_size];
        log::info!(
            "router prepared: variant {}, {sample_rate} Hz, max block {max_block_size}",
            self.caps
        );
    }

    /// Clear all signal state without reallocating. Smoothed controls jump
    /// to their current values.
    pub fn reset(&mut self) {
        self.smoothed.snap(&self.controls);
        self.envelope.reset();
        self.left.reset();
        self.right.reset();
        self.meter.reset();
        self.telemetry.clear();
        log::debug!("router reset");
    }

    pub fn capabilities(&self) -> Capabilities {
        self.caps
    }

    pub fn controls(&self) -> &Arc<SharedControls> {
        &self.controls
    }

    pub fn telemetry(&self) -> &Arc<Telemetry> {
        &self.telemetry
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn max_block_size(&self) -> usize {
        self.max_block_size
    }

    pub fn tail_seconds(&self) -> f64 {
        TAIL_SECONDS
    }

    /// Process a stereo block in place. Extra samples on the longer side
    /// are left untouched.
    pub fn process_block(&mut self, left: &mut [f32], right: &mut [f32]) {
        no_denormals(|| self.run(left, right));
        self.meter.publish(&self.telemetry);
    }

    /// Process a mono block in place: the input feeds both strips and the
    /// left output is kept. Telemetry covers the whole block even when it is
    /// longer than the prepared maximum.
    pub fn process_mono_block(&mut self, block: &mut [f32]) {
        let mut scratch = std::mem::take(&mut self.scratch);
        let chunk_len = scratch.len().max(1);
        no_denormals(|| {
            for chunk in block.chunks_mut(chunk_len) {
                let mirror = &mut scratch[..chunk.len()];
                mirror.copy_from_slice(chunk);
                self.run(chunk, mirror);
            }
        });
        self.scratch = scratch;
        self.meter.publish(&self.telemetry);
    }

    /// Per-sample loop shared by the block entry points. Accumulates into the
    /// meter without publishing.
    fn run(&mut self, left: &mut [f32], right: &mut [f32]) {
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let frame = self.smoothed.pull(&self.controls);
            let (out_l, out_r) = self.process_sample(&frame, *l as f64, *r as f64);
            *l = out_l as f32;
            *r = out_r as f32;
        }
    }

    /// Run one stereo sample through the chain with an explicit control
    /// frame and return the output pair. The frame is masked by the
    /// router's capabilities.
    #[inline]
    pub fn process_sample(&mut self, frame: &ControlFrame, dry_l: f64, dry_r: f64) -> (f64, f64) {
        let mut frame = *frame;
        self.caps.mask(&mut frame);

        let params = ReverbParameters {
            decay_seconds: frame.decay,
            shimmer: frame.shimmer,
            room_size: frame.size,
            burn: frame.burn,
            freeze: frame.is_frozen(),
        };
        self.left.reverb.set_parameters(&params);
        self.right.reverb.set_parameters(&params);

        let env = self.envelope.process((dry_l.abs() + dry_r.abs()) * 0.5);

        let drive = drive_gain(frame.drive);
        let mut wet_l = self.left.process(dry_l, &frame, drive);
        let mut wet_r = self.right.process(dry_r, &frame, drive);

        if frame.duck > ACTIVE_THRESHOLD {
            let sidechain = if frame.drive >= ACTIVE_THRESHOLD {
                env * drive
            } else {
                env
            };
            let duck_gain = (1.0 - frame.duck * sidechain).max(0.0);
            wet_l *= duck_gain;
            wet_r *= duck_gain;
        }

        let mix = frame.mix;
        let out_l = dry_l * (1.0 - mix) + wet_l * mix;
        let out_r = dry_r * (1.0 - mix) + wet_r * mix;

        self.meter.push(wet_l, out_l, out_r);
        (out_l, out_r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controls::{CinderParams, ControlId};

    fn router(caps: Capabilities, params: &CinderParams) -> SignalRouter {
        let controls = Arc::new(SharedControls::new());
        params.apply_to(&controls);
        let mut r = SignalRouter::new(caps, controls);
        r.prepare(44100.0, 256);
        r
    }

    #[test]
    fn dry_only_passes_input() {
        let params = CinderParams {
            mix: 0.0,
            ..CinderParams::default()
        };
        let mut r = router(Capabilities::dirt(), &params);
        let mut l: Vec<f32> = (0..256).map(|i| (i as f32 * 0.1).sin()).collect();
        let mut rr = l.clone();
        let expected = l.clone();
        r.process_block(&mut l, &mut rr);
        assert_eq!(l, expected);
        assert_eq!(rr, expected);
    }

    #[test]
    fn silence_in_silence_out() {
        let params = CinderParams {
            mix: 1.0,
            shimmer: 1.0,
            decay: 30.0,
            ..CinderParams::default()
        };
        let mut r = router(Capabilities::dirt(), &params);
        let mut l = vec![0.0_f32; 256];
        let mut rr = vec![0.0_f32; 256];
        for _ in 0..20 {
            r.process_block(&mut l, &mut rr);
            assert!(l.iter().chain(rr.iter()).all(|&x| x == 0.0));
        }
    }

    #[test]
    fn full_duck_mutes_wet_under_loud_input() {
        let params = CinderParams {
            mix: 1.0,
            duck: 1.0,
            ..CinderParams::default()
        };
        let mut r = router(Capabilities::dirt(), &params);
        let frame = params.frame();
        // settle the envelope at 1.0 with a sustained full-scale input
        let mut last = (0.0, 0.0);
        for _ in 0..44100 {
            last = r.process_sample(&frame, 1.0, 1.0);
        }
        assert!(last.0.abs() < 0.01 && last.1.abs() < 0.01, "{last:?}");
    }

    #[test]
    fn simple_ignores_duck_and_pre() {
        let mut frame = CinderParams::default().frame();
        frame.duck = 1.0;
        frame.pre = 1.0;
        frame.burn = 1.0;
        frame.drive = 1.0;
        frame.freeze = 1.0;
        Capabilities::simple().mask(&mut frame);
        assert_eq!(frame.duck, 0.0);
        assert_eq!(frame.pre, 0.0);
        assert_eq!(frame.burn, 0.0);
        assert_eq!(frame.drive, 0.0);
        assert_eq!(frame.freeze, 0.0);
    }

    #[test]
    fn variant_names_parse() {
        for name in ["dirt", "burn", "simple"] {
            let caps: Capabilities = name.parse().unwrap();
            assert_eq!(caps.to_string(), name);
        }
        assert!(matches!(
            "shimmer".parse::<Capabilities>(),
            Err(Error::InvalidVariant(_))
        ));
    }

    #[test]
    fn drive_keeps_unity_peaks() {
        for drive in [0.0, 0.3, 1.0] {
            let g = drive_gain(drive);
            assert!((drive_saturate(1.0, g) - 1.0).abs() < 1e-12);
            assert!((drive_saturate(-1.0, g) + 1.0).abs() < 1e-12);
            assert!(drive_saturate(0.2, g) >= 0.2 - 1e-12);
        }
    }

    #[test]
    fn telemetry_published_per_block() {
        let params = CinderParams {
            mix: 0.5,
            ..CinderParams::default()
        };
        let mut r = router(Capabilities::dirt(), &params);
        let mut l = vec![0.5_f32; 256];
        let mut rr = vec![0.5_f32; 256];
        r.process_block(&mut l, &mut rr);
        let t = r.telemetry().snapshot();
        assert!(t.output_peak > 0.0);
        assert!(t.output_rms <= t.output_peak + 1e-6);
    }

    #[test]
    fn mono_block_larger_than_max_block() {
        let params = CinderParams {
            mix: 0.0,
            ..CinderParams::default()
        };
        let mut r = router(Capabilities::simple(), &params);
        let mut block: Vec<f32> = (0..1000).map(|i| (i as f32 * 0.01).cos()).collect();
        let expected = block.clone();
        r.process_mono_block(&mut block);
        assert_eq!(block, expected);
    }

    #[test]
    fn controls_are_smoothed() {
        let mut r = router(Capabilities::dirt(), &CinderParams::default());
        r.controls().set(ControlId::Mix, 0.0);
        r.controls().set(ControlId::Decay, 0.1);
        // first sample still close to the old mix of 0.3
        let mut l = vec![1.0_f32; 1];
        let mut rr = vec![1.0_f32; 1];
        r.process_block(&mut l, &mut rr);
        assert!(l[0] < 0.8, "mix jumped: {}", l[0]);
    }

    #[test]
    fn zero_pre_leaves_pre_stage_untouched() {
        let params = CinderParams {
            pre: 0.0,
            degrade: 0.4,
            fold: 0.5,
            dirt: 0.5,
            mix: 0.5,
            ..CinderParams::default()
        };
        let mut r = router(Capabilities::dirt(), &params);
        let fresh = r.left.pre.clone();
        let input: Vec<f32> = (0..4096).map(|i| (i as f32 * 0.03).sin() * 0.8).collect();
        for chunk in input.chunks(256) {
            let mut l = chunk.to_vec();
            let mut rr = chunk.to_vec();
            r.process_block(&mut l, &mut rr);
        }

        // identical state means identical output from here on
        let frame = ControlFrame {
            degrade: 0.4,
            fold: 0.5,
            dirt: 0.5,
            ..ControlFrame::default()
        };
        let mut after = r.left.pre.clone();
        let mut untouched = fresh.clone();
        for i in 0..512 {
            let x = (i as f64 * 0.07).sin() * 0.6;
            assert_eq!(after.process(x, &frame), untouched.process(x, &frame), "sample {i}");
        }

        r.controls().set(ControlId::Pre, 1.0);
        r.reset();
        for chunk in input.chunks(256) {
            let mut l = chunk.to_vec();
            let mut rr = chunk.to_vec();
            r.process_block(&mut l, &mut rr);
        }
        let mut engaged = r.left.pre.clone();
        let mut untouched = fresh;
        let differs = (0..512).any(|i| {
            let x = (i as f64 * 0.07).sin() * 0.6;
            engaged.process(x, &frame) != untouched.process(x, &frame)
        });
        assert!(differs);
    }

    #[test]
    fn mono_telemetry_covers_whole_block() {
        let params = CinderParams {
            mix: 0.0,
            ..CinderParams::default()
        };
        let mut r = router(Capabilities::simple(), &params);
        // loud start, silent end: only the first of four internal chunks carries signal
        let mut block: Vec<f32> = (0..1000).map(|i| if i < 200 { 0.9 } else { 0.0 }).collect();
        r.process_mono_block(&mut block);
        let t = r.telemetry().snapshot();
        assert!((t.output_peak - 0.9).abs() < 1e-6, "peak={}", t.output_peak);
        let expected_rms = (0.81_f64 * 200.0 / 1000.0).sqrt();
        assert!((t.output_rms - expected_rms).abs() < 1e-4, "rms={}", t.output_rms);
    }

    #[test]
    fn decaying_tail_has_no_subnormal_output() {
        let params = CinderParams {
            decay: 0.1,
            mix: 1.0,
            ..CinderParams::default()
        };
        let mut r = router(Capabilities::dirt(), &params);
        let mut l = vec![0.0_f32; 256];
        let mut rr = vec![0.0_f32; 256];
        l[0] = 1.0;
        rr[0] = 1.0;
        for _ in 0..(3 * 44100 / 256) {
            r.process_block(&mut l, &mut rr);
            for (&a, &b) in l.iter().zip(rr.iter()) {
                assert!(a == 0.0 || a.abs() >= f32::MIN_POSITIVE, "left {a:e}");
                assert!(b == 0.0 || b.abs() >= f32::MIN_POSITIVE, "right {b:e}");
            }
            l.fill(0.0);
            rr.fill(0.0);
        }
    }
}
