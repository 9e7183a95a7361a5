use std::sync::Arc;

use cinder_dsp::controls::{CinderParams, ControlId, SharedControls};
use cinder_dsp::hadamard;
use cinder_dsp::lofi::{self, LofiDegrader};
use cinder_dsp::reverb::{self, ReverbParameters, ShimmerReverb};
use cinder_dsp::router::{Capabilities, SignalRouter};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const SR: f64 = 44100.0;
const BLOCK: usize = 256;

fn router(caps: Capabilities, params: &CinderParams) -> SignalRouter {
    let controls = Arc::new(SharedControls::new());
    params.apply_to(&controls);
    let mut r = SignalRouter::new(caps, controls);
    r.prepare(SR, BLOCK);
    r
}

/// Feed `input` to both channels block by block, returning the left output.
fn render(r: &mut SignalRouter, input: &[f32]) -> Vec<f32> {
    let mut out = Vec::with_capacity(input.len());
    for chunk in input.chunks(BLOCK) {
        let mut l = chunk.to_vec();
        let mut rr = chunk.to_vec();
        r.process_block(&mut l, &mut rr);
        out.extend_from_slice(&l);
    }
    out
}

fn impulse(len: usize) -> Vec<f32> {
    let mut v = vec![0.0; len];
    v[0] = 1.0;
    v
}

fn rms(s: &[f64]) -> f64 {
    (s.iter().map(|x| x * x).sum::<f64>() / s.len() as f64).sqrt()
}

fn secs(t: f64) -> usize {
    (t * SR) as usize
}

#[test]
fn scenario_a_full_degrade_hits_floors() {
    let mut lofi = LofiDegrader::new(SR);
    lofi.set_degrade(1.0);
    assert!((lofi.target_rate() - 4000.0).abs() < 1e-6);
    assert_eq!(lofi.bit_depth(), 4.0);
    assert!((lofi::target_sample_rate(48000.0, 1.0) - 4000.0).abs() < 1e-6);
}

#[test]
fn scenario_b_infinite_decay_holds_tail() {
    let mut verb = ShimmerReverb::new(SR);
    verb.set_parameters(&ReverbParameters::new(30.0, 0.0, 0.5));
    assert!(verb.parameters().is_infinite());

    let mut out = Vec::with_capacity(secs(5.5));
    out.push(verb.process(1.0));
    for _ in 1..secs(5.5) {
        out.push(verb.process(0.0));
    }
    let early = rms(&out[secs(0.5)..secs(1.0)]);
    let late = rms(&out[secs(5.0)..secs(5.5)]);
    assert!(early > 1e-4, "early={early}");
    assert!(late >= 0.9 * early, "early={early} late={late}");
}

#[test]
fn scenario_c_zero_pre_bypasses_pre_destruction() {
    let params = CinderParams {
        pre: 0.0,
        dirt: 0.5,
        degrade: 0.6,
        fold: 0.4,
        duck: 0.0,
        mix: 0.5,
        decay: 3.0,
        shimmer: 0.4,
        ..CinderParams::default()
    };
    let input = impulse(secs(1.0));

    let mut routed = router(Capabilities::dirt(), &params);
    // simple has no pre stage at all
    let mut post_only = router(Capabilities::simple(), &params);
    let a = render(&mut routed, &input);
    let b = render(&mut post_only, &input);
    assert_eq!(a, b);

    // and the pre stage does change the result when engaged
    let mut pre_heavy = router(Capabilities::dirt(), &CinderParams { pre: 1.0, ..params });
    let c = render(&mut pre_heavy, &input);
    assert_ne!(a, c);
}

#[test]
fn reverb_is_bounded_at_extremes() {
    let mut verb = ShimmerReverb::new(SR);
    verb.set_parameters(&ReverbParameters::new(30.0, 1.0, 1.0).with_burn(1.0));
    let mut peak: f64 = 0.0;
    for n in 0..secs(10.0) {
        let x = if n == secs(0.5) { 1.0 } else { 0.0 };
        peak = peak.max(verb.process(x).abs());
    }
    assert!(peak.is_finite() && peak < 4.0, "peak={peak}");
}

#[test]
fn reverb_is_bounded_under_full_scale_noise() {
    let mut rng = ChaCha8Rng::seed_from_u64(99);
    for (decay, shimmer, size) in [(30.0, 1.0, 1.0), (13.0, 1.0, 0.0), (0.1, 0.5, 0.5)] {
        let mut verb = ShimmerReverb::new(SR);
        verb.set_parameters(&ReverbParameters::new(decay, shimmer, size));
        for _ in 0..secs(3.0) {
            let x: f64 = rng.random_range(-1.0..=1.0);
            let y = verb.process(x);
            assert!(y.is_finite() && y.abs() < 4.0, "decay={decay} y={y}");
        }
    }
}

#[test]
fn router_is_bounded_with_everything_on() {
    let params = CinderParams {
        decay: 30.0,
        shimmer: 1.0,
        size: 1.0,
        degrade: 1.0,
        fold: 1.0,
        dirt: 1.0,
        pre: 0.5,
        duck: 0.5,
        mix: 1.0,
        drive: 1.0,
        burn: 1.0,
        freeze: 0.0,
        meta: None,
    };
    for caps in [Capabilities::dirt(), Capabilities::burn(), Capabilities::simple()] {
        let mut r = router(caps, &params);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let input: Vec<f32> = (0..secs(2.0))
            .map(|_| rng.random_range(-1.0_f32..=1.0))
            .collect();
        let out = render(&mut r, &input);
        assert!(
            out.iter().all(|y| y.is_finite() && y.abs() < 4.0),
            "{caps} out of bounds"
        );
    }
}

#[test]
fn bypass_identity_at_zero_amount() {
    let mut lofi = LofiDegrader::new(SR);
    let mut folder = cinder_dsp::Wavefolder::new(SR);
    lofi.set_degrade(0.0);
    folder.set_fold(0.0);
    for i in 0..2000 {
        let x = (i as f64 * 0.013).sin() * 0.9;
        assert_eq!(lofi.process(x), x);
        assert_eq!(folder.process(x), x);
    }
}

#[test]
fn hadamard_preserves_energy_of_noise() {
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    for _ in 0..100 {
        let v: [f64; hadamard::LINES] = std::array::from_fn(|_| rng.random_range(-1.0..1.0));
        let e_in: f64 = v.iter().map(|x| x * x).sum();
        let e_out: f64 = hadamard::mix(&v).iter().map(|x| x * x).sum();
        assert!((e_in - e_out).abs() < 1e-12);
    }
}

#[test]
fn longer_decay_means_slower_decay_rate() {
    let mut last_rate = f64::INFINITY;
    let mut last_gain = 0.0;
    let mut decay = 0.1;
    while decay < 29.5 {
        let gain = reverb::feedback_gain_for_decay(decay);
        let rate = reverb::decay_rate_db_per_second(gain);
        assert!(gain < 1.0);
        assert!(gain >= last_gain);
        // strictly decreasing until the gain cap takes over
        if decay < 13.0 {
            assert!(rate < last_rate, "decay={decay}");
        } else {
            assert!(rate <= last_rate, "decay={decay}");
        }
        last_rate = rate;
        last_gain = gain;
        decay += 0.1;
    }
}

#[test]
fn freeze_holds_tail_and_ignores_input() {
    let params = CinderParams {
        mix: 1.0,
        decay: 2.0,
        ..CinderParams::default()
    };
    let mut r = router(Capabilities::burn(), &params);

    let mut input = impulse(secs(0.3));
    let _ = render(&mut r, &input);

    r.controls().set(ControlId::Freeze, 1.0);
    input.fill(0.0);
    let settle = render(&mut r, &input);
    let held = rms(&settle[secs(0.2)..].iter().map(|&x| x as f64).collect::<Vec<_>>());
    assert!(held > 1e-5, "held={held}");

    // loud input must not reach the frozen network
    let loud = vec![0.9_f32; secs(2.0)];
    let after = render(&mut r, &loud);
    let late = rms(&after[secs(1.5)..].iter().map(|&x| x as f64).collect::<Vec<_>>());
    assert!(late < held * 1.5 && late > held * 0.5, "held={held} late={late}");
}

#[test]
fn telemetry_tracks_output() {
    let params = CinderParams {
        mix: 0.5,
        decay: 4.0,
        ..CinderParams::default()
    };
    let mut r = router(Capabilities::dirt(), &params);
    let _ = render(&mut r, &impulse(BLOCK * 8));
    let t = r.telemetry().snapshot();
    assert!(t.reverb_level > 0.0);
    assert!(t.output_rms > 0.0 && t.output_rms <= t.output_peak + 1e-6);

    r.reset();
    assert_eq!(r.telemetry().snapshot().output_peak, 0.0);
}

#[test]
fn reset_reproduces_output() {
    let params = CinderParams {
        degrade: 0.3,
        fold: 0.2,
        shimmer: 0.6,
        mix: 0.7,
        ..CinderParams::default()
    };
    let mut r = router(Capabilities::dirt(), &params);
    let input = impulse(secs(0.5));
    let first = render(&mut r, &input);
    r.reset();
    let second = render(&mut r, &input);
    assert_eq!(first, second);
}
