//! Disperser offline renderer
//!
//! Usage:
//!   disperser-render in.wav out.wav --stages 64 --series 2 --freq 800 --shape 0.3
//!   disperser-render in.wav out.wav --reverse --config engine.json

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use disperser_core::DisperserConfig;
use disperser_render::{RenderSettings, render_file};

#[derive(Parser)]
#[command(name = "disperser-render", version, about = "Render a WAV file through the disperser")]
struct Cli {
    /// Input WAV file (mono or stereo)
    input: PathBuf,

    /// Output WAV file (32-bit float)
    output: PathBuf,

    /// Allpass stages per series
    #[arg(long, default_value_t = disperser_core::DEFAULT_STAGES as f64)]
    stages: f64,

    /// Sequential passes through the stage chain (1-4)
    #[arg(long, default_value_t = disperser_core::DEFAULT_SERIES)]
    series: usize,

    /// Center frequency in Hz
    #[arg(long, default_value_t = disperser_core::DEFAULT_FREQ_HZ)]
    freq: f64,

    /// Pinch toward the center frequency (0-1)
    #[arg(long, default_value_t = disperser_core::DEFAULT_SHAPE)]
    shape: f64,

    /// Reverse (overlap-add) mode
    #[arg(long)]
    reverse: bool,

    /// Flip the output polarity
    #[arg(long)]
    invert: bool,

    /// Force shape to 0
    #[arg(long)]
    shape_lock_min: bool,

    /// Force shape to 1 (overrides --shape-lock-min)
    #[arg(long)]
    shape_lock_max: bool,

    /// Host block size
    #[arg(long, default_value_t = 512)]
    block_size: usize,

    /// Engine configuration as JSON (missing fields use defaults)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn load_config(path: Option<&PathBuf>) -> Result<DisperserConfig> {
    let Some(path) = path else {
        return Ok(DisperserConfig::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config: DisperserConfig = serde_json::from_str(&text)
        .with_context(|| format!("parsing config {}", path.display()))?;
    config.validate().context("invalid engine configuration")?;
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let settings = RenderSettings {
        stages: cli.stages,
        series: cli.series,
        frequency: cli.freq,
        shape: cli.shape,
        reverse: cli.reverse,
        invert: cli.invert,
        shape_lock_min: cli.shape_lock_min,
        shape_lock_max: cli.shape_lock_max,
        block_size: cli.block_size,
        config: load_config(cli.config.as_ref())?,
    };
    log::debug!("render settings: {settings:?}");

    let report = render_file(&cli.input, &cli.output, &settings)
        .with_context(|| format!("rendering {}", cli.input.display()))?;

    println!(
        "{} -> {}: {} frames, {} ch @ {} Hz, latency {} samples, tail {:.3}s, {} reverse frames",
        cli.input.display(),
        cli.output.display(),
        report.output_frames,
        report.channels,
        report.sample_rate,
        report.latency_samples,
        report.tail_seconds,
        report.frames_rendered
    );
    Ok(())
}
