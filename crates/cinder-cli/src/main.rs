//! Offline renderer for the cinder engine.
//!
//! Usage: cinder [input.wav] -o output.wav [--preset name|file.json] [--set key=value]...
//!
//! Drives the signal router block by block exactly like a host callback,
//! appends the reverb tail and writes a 32-bit float WAV. Without an input
//! file a single click is rendered.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use cinder_dsp::controls::{CinderParams, ControlId, SharedControls};
use cinder_dsp::preset::{self, Preset};
use cinder_dsp::router::{Capabilities, SignalRouter};
use cinder_dsp::telemetry::gain_to_db;
use clap::Parser;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

#[derive(Parser)]
#[command(name = "cinder", about = "Destructive shimmer reverb renderer")]
struct Cli {
    /// Input WAV file (omit to render a click)
    #[arg()]
    input_wav: Option<PathBuf>,

    /// Output WAV file
    #[arg(short, long, default_value = "cinder_out.wav")]
    output: PathBuf,

    /// Factory preset name or path to a preset JSON file
    #[arg(short, long)]
    preset: Option<String>,

    /// Processor variant: dirt, burn or simple
    #[arg(long, default_value = "dirt")]
    variant: String,

    /// Override a control, e.g. --set decay=12 (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE")]
    overrides: Vec<String>,

    /// Host block size
    #[arg(long, default_value_t = 512)]
    block_size: usize,

    /// Seconds of silence appended for the tail (default: engine tail length)
    #[arg(long)]
    tail: Option<f64>,

    /// Sample rate of the synthesized click
    #[arg(long, default_value_t = 44100)]
    sample_rate: u32,

    /// Forward engine log output to stderr
    #[arg(short, long)]
    verbose: bool,

    /// List available presets and exit
    #[arg(long)]
    list_presets: bool,
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn init_logging(verbose: bool) {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(if verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Warn
        });
    }
}

// ---------------------------------------------------------------------------
// Presets and controls
// ---------------------------------------------------------------------------

fn all_presets() -> Vec<Preset> {
    let mut presets = preset::factory_presets();
    if let Some(dir) = preset::find_preset_dir() {
        presets.extend(preset::load_presets(&dir));
    }
    presets
}

fn resolve_preset(arg: &str) -> Result<Preset> {
    let path = Path::new(arg);
    if path.is_file() {
        return Preset::load(path).with_context(|| format!("loading preset {arg}"));
    }
    all_presets()
        .into_iter()
        .find(|p| p.name == arg)
        .with_context(|| format!("no preset named `{arg}` (try --list-presets)"))
}

fn apply_override(params: &mut CinderParams, assignment: &str) -> Result<()> {
    let (key, value) = assignment
        .split_once('=')
        .with_context(|| format!("expected KEY=VALUE, got `{assignment}`"))?;
    let id: ControlId = key.parse()?;
    let value: f64 = value
        .trim()
        .parse()
        .with_context(|| format!("invalid value for {}: `{value}`", id.key()))?;
    let (lo, hi) = id.range();
    if !(lo..=hi).contains(&value) {
        eprintln!("Note: {} = {value} outside {lo}..{hi}, clamping", id.key());
    }
    params.set(id, id.clamp(value));
    Ok(())
}

// ---------------------------------------------------------------------------
// WAV I/O
// ---------------------------------------------------------------------------

/// Deinterleaved channels and sample rate.
fn read_wav(path: &Path) -> Result<(Vec<Vec<f32>>, u32)> {
    let reader = WavReader::open(path).with_context(|| format!("opening {}", path.display()))?;
    let spec = reader.spec();
    let channels = spec.channels as usize;
    if !(1..=2).contains(&channels) {
        bail!("unsupported channel count: {channels}");
    }

    eprintln!(
        "Input: {} ch, {} Hz, {}-bit, {} samples/ch",
        channels,
        spec.sample_rate,
        spec.bits_per_sample,
        reader.len() as usize / channels
    );

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Int => {
            let max_val = (1_i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<Result<_, _>>()
                .with_context(|| format!("decoding {}", path.display()))?
        }
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .with_context(|| format!("decoding {}", path.display()))?,
    };

    let mut out = vec![Vec::with_capacity(interleaved.len() / channels); channels];
    for frame in interleaved.chunks_exact(channels) {
        for (ch, &s) in out.iter_mut().zip(frame) {
            ch.push(s);
        }
    }
    Ok((out, spec.sample_rate))
}

fn write_wav(path: &Path, channels: &[Vec<f32>], sample_rate: u32) -> Result<()> {
    let spec = WavSpec {
        channels: channels.len() as u16,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer =
        WavWriter::create(path, spec).with_context(|| format!("creating {}", path.display()))?;
    let len = channels.first().map_or(0, Vec::len);
    for i in 0..len {
        for ch in channels {
            writer.write_sample(ch[i])?;
        }
    }
    writer
        .finalize()
        .with_context(|| format!("finalizing {}", path.display()))?;
    Ok(())
}

fn gen_click(sample_rate: u32, duration: f32) -> Vec<f32> {
    let n = ((sample_rate as f32 * duration) as usize).max(1);
    let mut signal = vec![0.0f32; n];
    signal[0] = 1.0;
    signal
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

#[derive(Default)]
struct RenderStats {
    max_peak: f64,
    max_reverb: f64,
    blocks: usize,
}

fn render(router: &mut SignalRouter, channels: &mut [Vec<f32>], block_size: usize) -> RenderStats {
    let mut stats = RenderStats::default();
    let telemetry = Arc::clone(router.telemetry());

    match channels {
        [mono] => {
            for block in mono.chunks_mut(block_size) {
                router.process_mono_block(block);
                stats.observe(&telemetry.snapshot());
            }
        }
        [left, right] => {
            for (l, r) in left.chunks_mut(block_size).zip(right.chunks_mut(block_size)) {
                router.process_block(l, r);
                stats.observe(&telemetry.snapshot());
            }
        }
        _ => {}
    }
    stats
}

impl RenderStats {
    fn observe(&mut self, t: &cinder_dsp::TelemetrySnapshot) {
        self.max_peak = self.max_peak.max(t.output_peak);
        self.max_reverb = self.max_reverb.max(t.reverb_level);
        self.blocks += 1;
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if cli.list_presets {
        for p in all_presets() {
            println!("{:<20} {:<14} {}", p.name, p.category, p.description);
        }
        return Ok(());
    }

    let caps: Capabilities = cli.variant.parse()?;

    let mut params = match &cli.preset {
        Some(arg) => {
            let preset = resolve_preset(arg)?;
            eprintln!("Preset: {} ({})", preset.name, preset.category);
            preset.params
        }
        None => CinderParams::default(),
    };
    for assignment in &cli.overrides {
        apply_override(&mut params, assignment)?;
    }
    params.normalize();

    let (mut channels, sample_rate) = match &cli.input_wav {
        Some(path) => read_wav(path)?,
        None => {
            eprintln!("No input given, rendering a click at {} Hz", cli.sample_rate);
            (vec![gen_click(cli.sample_rate, 0.1)], cli.sample_rate)
        }
    };

    let controls = Arc::new(SharedControls::new());
    params.apply_to(&controls);
    let block_size = cli.block_size.max(1);
    let mut router = SignalRouter::new(caps, controls);
    router.prepare(sample_rate as f64, block_size);

    let tail = cli.tail.unwrap_or_else(|| router.tail_seconds()).max(0.0);
    let tail_samples = (tail * sample_rate as f64) as usize;
    for ch in channels.iter_mut() {
        ch.resize(ch.len() + tail_samples, 0.0);
    }

    eprintln!(
        "Processing {} ch, variant {caps}, decay {:.2}s, shimmer {:.2}, mix {:.2}, tail {tail:.1}s...",
        channels.len(),
        params.decay,
        params.shimmer,
        params.mix,
    );
    let stats = render(&mut router, &mut channels, block_size);

    write_wav(&cli.output, &channels, sample_rate)?;

    let last = router.telemetry().snapshot();
    eprintln!(
        "Written {} ({} samples/ch, {} blocks)",
        cli.output.display(),
        channels.first().map_or(0, Vec::len),
        stats.blocks
    );
    eprintln!(
        "Peak {:.1} dBFS, reverb peak {:.1} dBFS, final block rms {:.1} dBFS",
        gain_to_db(stats.max_peak),
        gain_to_db(stats.max_reverb),
        last.rms_db()
    );
    Ok(())
}
