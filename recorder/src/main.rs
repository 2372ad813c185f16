use anyhow::Context;
use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use thermcore::source::{DeviceSource, FrameSource, SyntheticSource};
use thermcore::telemetry::MetricsRecorder;
use workflow::config::{Overrides, RecorderConfig, SourceKind};
use workflow::runner::Runner;

mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Always-on thermal trail recorder")]
struct Args {
    /// Load the recorder config from YAML
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override the media root directory
    #[arg(long)]
    media_root: Option<PathBuf>,
    /// Read frames from this device instead of the configured one
    #[arg(long)]
    device: Option<PathBuf>,
    /// Use the scripted synthetic source
    #[arg(long, default_value_t = false)]
    synthetic: bool,
    /// Stop after this many acquisition attempts
    #[arg(long)]
    cycles: Option<u64>,
    /// Run as fast as frames arrive instead of pacing to the configured fps
    #[arg(long, default_value_t = false)]
    fast: bool,
}

fn build_source(config: &RecorderConfig) -> Box<dyn FrameSource> {
    match config.source {
        SourceKind::Device => Box::new(DeviceSource::new(config.device.clone())),
        SourceKind::Synthetic => Box::new(SyntheticSource::new(config.synthetic.clone())),
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let base = match &args.config {
        Some(path) => RecorderConfig::load(path)?,
        None => RecorderConfig::default(),
    };
    let config = base.with_overrides(&Overrides {
        media_root: args.media_root.clone(),
        device: args.device.clone(),
        synthetic: args.synthetic,
        fast: args.fast,
    });

    let shutdown = Arc::new(AtomicBool::new(false));
    let _signal_thread =
        workflow::shutdown::install(shutdown.clone()).context("installing shutdown handler")?;

    let metrics = Arc::new(MetricsRecorder::new());
    let runner = Runner::new(&config, build_source(&config), shutdown, metrics.clone())?
        .with_max_attempts(args.cycles);
    let summary = runner.run();

    let snapshot = metrics.snapshot();
    info!(
        "stopped after {} cycle(s), {} event(s): device_errors={} storage_errors={} signal_errors={} resets={} sessions={} photos={}",
        summary.cycles,
        summary.events,
        snapshot.device_errors,
        snapshot.storage_errors,
        snapshot.signal_errors,
        snapshot.background_resets,
        snapshot.sessions,
        snapshot.photos
    );
    Ok(())
}
