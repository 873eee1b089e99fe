//! Command-line batch driver: feed a capture WAV and a render WAV through
//! the echo canceller and write the cleaned capture stream.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use echowash::config::PipelineConfig;
use echowash::engine::Aec3Engine;
use echowash::pipeline::PipelineDriver;
use echowash::wav_io::{StreamSource, WavSink, WavSource};

#[derive(Debug, Parser)]
#[command(name = "echowash")]
#[command(about = "Offline acoustic echo cancellation over WAV files")]
struct Cli {
    /// Capture-side WAV file (microphone signal containing echo).
    capture: PathBuf,

    /// Render-side WAV file (loudspeaker reference signal).
    render: PathBuf,

    /// Cleaned output WAV file.
    output: PathBuf,

    /// Internal processing rate in Hz (8000, 16000, 32000 or 48000).
    #[arg(long, default_value_t = 16000)]
    working_rate: u32,

    /// Internal processing channel count.
    #[arg(long, default_value_t = 1)]
    working_channels: usize,

    /// Output sample rate in Hz; defaults to the working rate.
    #[arg(long)]
    output_rate: Option<u32>,

    /// Output channel count; defaults to the working channel count.
    #[arg(long)]
    output_channels: Option<usize>,

    /// Frame duration in milliseconds.
    #[arg(long, default_value_t = 10)]
    frame_ms: u32,

    /// Restrict the canceller to its linear stage where supported.
    #[arg(long)]
    linear_aec_only: bool,
}

impl Cli {
    fn config(&self) -> Result<PipelineConfig> {
        let mut builder = PipelineConfig::builder()
            .working_rate_hz(self.working_rate)
            .working_channels(self.working_channels)
            .frame_duration_ms(self.frame_ms)
            .linear_aec_only(self.linear_aec_only);
        if let Some(rate) = self.output_rate {
            builder = builder.output_rate_hz(rate);
        }
        if let Some(channels) = self.output_channels {
            builder = builder.output_channels(channels);
        }
        Ok(builder.build()?)
    }
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config()?;

    let capture = WavSource::open(&cli.capture)
        .with_context(|| format!("open capture stream {}", cli.capture.display()))?;
    let render = WavSource::open(&cli.render)
        .with_context(|| format!("open render stream {}", cli.render.display()))?;
    tracing::info!(
        capture = %cli.capture.display(),
        capture_rate_hz = capture.descriptor().sample_rate_hz(),
        render = %cli.render.display(),
        render_rate_hz = render.descriptor().sample_rate_hz(),
        "streams opened"
    );

    let sink = WavSink::create(&cli.output, config.output_rate_hz(), config.output_channels())
        .with_context(|| format!("create output stream {}", cli.output.display()))?;
    let engine = Aec3Engine::new(&config)?;

    let report = PipelineDriver::new(config, capture, render, sink, engine)?.run()?;

    match report.short_read {
        None => println!(
            "{}: wrote {} frames",
            cli.output.display(),
            report.frames_processed
        ),
        Some(role) => println!(
            "{}: wrote {} of {} frames ({role} stream ended early)",
            cli.output.display(),
            report.frames_processed,
            report.frames_expected
        ),
    }
    Ok(())
}
