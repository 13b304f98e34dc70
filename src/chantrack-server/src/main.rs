// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

mod config;
mod report;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use num_complex::Complex;
use tokio::signal;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{error, info};

use chantrack_app::{init_logging, ConfigFile, DynResult};
use chantrack_dsp::{
    run_tick_loop, spawn_iq_reader, Channel, IqSource, MockIqSource, ToneIqSource, TrackerType,
};

use config::{clamp_alpha_ema, ServerConfig, SourceConfig, SourceKind};

const PKG_DESCRIPTION: &str = concat!(env!("CARGO_PKG_NAME"), " - tracking channel daemon");
const OUTPUT_BROADCAST_CAPACITY: usize = 64;

#[derive(Debug, Parser)]
#[command(
    author = env!("CARGO_PKG_AUTHORS"),
    version = env!("CARGO_PKG_VERSION"),
    about = PKG_DESCRIPTION,
)]
struct Cli {
    /// Path to configuration file
    #[arg(long = "config", short = 'C', value_name = "FILE")]
    config: Option<PathBuf>,
    /// Print example configuration and exit
    #[arg(long = "print-config")]
    print_config: bool,
    /// Feed a test tone at this offset from the input centre (Hz)
    #[arg(long = "tone-hz", allow_negative_numbers = true)]
    tone_hz: Option<f64>,
    /// Channel offset from the input centre (Hz)
    #[arg(short = 'o', long = "offset-hz", allow_negative_numbers = true)]
    offset_hz: Option<i64>,
    /// Carrier tracker
    #[arg(short = 't', long = "tracker", value_enum)]
    tracker: Option<TrackerArg>,
    /// Feed tracker estimates back into the channel offset
    #[arg(long = "tracking")]
    tracking: bool,
    /// Smoothing factor of the averaged frequency error, clamped to [0.01, 1]
    #[arg(long = "alpha-ema")]
    alpha_ema: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TrackerArg {
    None,
    Pll,
    Fll,
}

impl From<TrackerArg> for TrackerType {
    fn from(arg: TrackerArg) -> Self {
        match arg {
            TrackerArg::None => TrackerType::None,
            TrackerArg::Pll => TrackerType::Pll,
            TrackerArg::Fll => TrackerType::Fll,
        }
    }
}

/// Fold command-line overrides into the loaded configuration.
fn apply_cli_overrides(cli: &Cli, cfg: &mut ServerConfig) {
    if let Some(tone_hz) = cli.tone_hz {
        cfg.source.kind = SourceKind::Tone;
        cfg.source.tone_offset_hz = tone_hz;
    }
    if let Some(offset) = cli.offset_hz {
        cfg.channel.input_frequency_offset_hz = offset;
    }
    if let Some(tracker) = cli.tracker {
        cfg.channel.tracker = tracker.into();
    }
    if cli.tracking {
        cfg.channel.tracking = true;
    }
    if let Some(alpha) = cli.alpha_ema {
        cfg.channel.alpha_ema = clamp_alpha_ema(alpha);
    }
}

fn build_source(source: &SourceConfig) -> Box<dyn IqSource> {
    match source.kind {
        SourceKind::Tone => Box::new(ToneIqSource::new(
            source.tone_offset_hz,
            source.sample_rate,
            source.amplitude,
        )),
        SourceKind::Silence => Box::new(MockIqSource),
    }
}

#[tokio::main]
async fn main() -> DynResult<()> {
    let cli = Cli::parse();

    if cli.print_config {
        println!("{}", ServerConfig::example_toml());
        return Ok(());
    }

    let (mut cfg, config_path) = ServerConfig::load(cli.config.as_deref())?;
    apply_cli_overrides(&cli, &mut cfg);
    cfg.validate()
        .map_err(|e| format!("Invalid server configuration: {}", e))?;

    init_logging(cfg.general.log_level.as_deref());

    if let Some(ref path) = config_path {
        info!("Loaded configuration from {}", path.display());
    }
    info!(
        "Starting chantrack-server (source: {:?} @ {} Hz, channel: {} Hz at {} Hz offset, tracker: {:?}, tracking: {})",
        cfg.source.kind,
        cfg.source.sample_rate,
        cfg.channel.channel_sample_rate,
        cfg.channel.input_frequency_offset_hz,
        cfg.channel.tracker,
        cfg.channel.tracking
    );

    let (output_tx, output_rx) =
        broadcast::channel::<Vec<Complex<f32>>>(OUTPUT_BROADCAST_CAPACITY);
    let channel = Arc::new(Channel::new(
        cfg.source.sample_rate,
        cfg.channel.clone(),
        Box::new(output_tx),
    )?);
    channel.start();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reader = spawn_iq_reader(
        build_source(&cfg.source),
        Arc::clone(&channel),
        cfg.source.sample_rate,
        cfg.source.block_size,
        shutdown_rx.clone(),
    )?;

    let mut task_handles: Vec<JoinHandle<()>> = Vec::new();
    task_handles.push(tokio::spawn(run_tick_loop(
        Arc::clone(&channel),
        Duration::from_millis(cfg.tick.interval_ms),
        shutdown_rx.clone(),
    )));

    if cfg.report.enabled {
        task_handles.push(tokio::spawn(report::run_reporter(
            Arc::clone(&channel),
            output_rx,
            Duration::from_millis(cfg.report.interval_ms),
            shutdown_rx.clone(),
        )));
    } else {
        drop(output_rx);
    }

    signal::ctrl_c().await?;
    info!("Ctrl+C received, shutting down");
    let _ = shutdown_tx.send(true);
    channel.stop();

    for handle in task_handles {
        let _ = handle.await;
    }
    match tokio::task::spawn_blocking(move || reader.join()).await {
        Ok(Ok(())) => {}
        Ok(Err(_)) => error!("IQ reader thread panicked"),
        Err(e) => error!("failed to join IQ reader: {}", e),
    }

    let final_report = channel.report();
    info!(
        "Final channel offset {} Hz (avg error {:.1} Hz)",
        final_report.input_frequency_offset_hz, final_report.avg_delta_freq_hz
    );
    Ok(())
}
