use anyhow::{Context, Result};
use clap::Parser;
use factory_devices::{FactoryController, NullDisplay, SnapshotDisplay};
use factory_pipeline::{Collaborators, DisplaySink, Factory, FactoryConfig, WorkerExit};
use log::{info, warn};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Conveyor inspection line: two camera lanes feeding the sorter.
#[derive(Parser, Debug)]
#[command(version, about)]
struct CliArgs {
    /// Factory controller serial device [default: /dev/ttyACM0]
    #[arg(long)]
    device: Option<PathBuf>,

    /// JSON factory configuration; built-in two-lane defaults otherwise
    #[arg(long)]
    config: Option<PathBuf>,

    /// Frame source (image directory or video file) for every lane
    #[arg(long)]
    source: Option<PathBuf>,

    /// Milliseconds between frames sampled by each lane
    #[arg(long)]
    sample_interval_ms: Option<u64>,

    /// Write the latest image of each view here as PNG
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,

    /// Show each view in its own window; press q to quit
    #[cfg(feature = "sdl")]
    #[arg(long)]
    window: bool,
}

fn load_config(args: &CliArgs) -> Result<FactoryConfig> {
    let mut config = match &args.config {
        Some(path) => FactoryConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => FactoryConfig::default(),
    };
    if let Some(device) = &args.device {
        config.device = device.clone();
    }
    if let Some(source) = &args.source {
        config.set_source(source);
    }
    if let Some(ms) = args.sample_interval_ms {
        config.sample_interval_ms = ms;
    }
    if let Some(dir) = &args.snapshot_dir {
        config.snapshot_dir = Some(dir.clone());
    }
    Ok(config)
}

#[cfg(feature = "sdl")]
fn window_display(args: &CliArgs) -> Result<Option<Box<dyn DisplaySink>>> {
    if !args.window {
        return Ok(None);
    }
    let display = factory_devices::WindowDisplay::new().context("Failed to open windows")?;
    Ok(Some(Box::new(display)))
}

#[cfg(not(feature = "sdl"))]
fn window_display(_args: &CliArgs) -> Result<Option<Box<dyn DisplaySink>>> {
    Ok(None)
}

fn open_display(args: &CliArgs, config: &FactoryConfig) -> Result<Box<dyn DisplaySink>> {
    if let Some(display) = window_display(args)? {
        return Ok(display);
    }
    Ok(match &config.snapshot_dir {
        Some(dir) => Box::new(
            SnapshotDisplay::new(dir)
                .with_context(|| format!("Failed to prepare {}", dir.display()))?,
        ),
        None => Box::new(NullDisplay::new()),
    })
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = CliArgs::parse();
    let config = load_config(&args)?;

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        if let Err(err) = ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst)) {
            warn!("Failed to install Ctrl+C handler: {err}");
        }
    }

    let display = open_display(&args, &config)?;
    let controller = FactoryController::open(&config.device);
    let factory = Factory::build(
        &config,
        Collaborators {
            actuator: Box::new(controller),
            display,
            stop: Box::new(stop),
        },
    )
    .context("Factory setup failed")?;

    info!("running {} lanes, press Ctrl+C to stop", factory.lanes().len());
    let report = factory.run().context("Factory run failed")?;
    info!("{report}");

    let failed: Vec<String> = report
        .workers
        .iter()
        .filter_map(|(id, exit)| match exit {
            WorkerExit::Failed(msg) => Some(format!("{id}: {msg}")),
            _ => None,
        })
        .collect();
    if !failed.is_empty() {
        anyhow::bail!("lanes failed: {}", failed.join("; "));
    }
    Ok(())
}
