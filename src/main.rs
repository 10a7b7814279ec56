// main.rs — Command-line driver.
//
//   holodepth [CONFIG.toml] [--mode sequential|parallel|gpu] [--seed N]
//             [--frames N] [--source DIR] [--output DIR]
//
// Logging goes through tracing; set RUST_LOG (e.g. `RUST_LOG=holodepth=debug`)
// to change the default `info` level.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use holodepth::{ExecutionMode, HologramPipeline, RunConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "Depth-map hologram synthesis")]
struct Cli {
    /// TOML run configuration. Built-in defaults are used when omitted.
    config: Option<PathBuf>,

    /// Accumulation strategy (overrides `[run] mode`).
    #[arg(long)]
    mode: Option<ExecutionMode>,

    /// Random-phase seed (overrides `[run] seed`).
    #[arg(long)]
    seed: Option<u64>,

    /// Number of frames; implies sequence mode.
    #[arg(long)]
    frames: Option<usize>,

    /// Input folder (overrides `[sequence] source_folder`).
    #[arg(long)]
    source: Option<PathBuf>,

    /// Output folder (overrides `[sequence] result_folder`).
    #[arg(long)]
    output: Option<PathBuf>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);
    Registry::default().with(filter).with(fmt_layer).init();
}

fn load_config(cli: &Cli) -> Result<RunConfig> {
    let mut config = match &cli.config {
        Some(path) => RunConfig::load(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => RunConfig::default(),
    };
    if let Some(mode) = cli.mode {
        config.run.mode = mode;
    }
    if let Some(seed) = cli.seed {
        config.run.seed = Some(seed);
    }
    if let Some(frames) = cli.frames {
        config.sequence.static_image = false;
        config.sequence.frame_count = frames;
    }
    if let Some(source) = &cli.source {
        config.sequence.source_folder = source.clone();
    }
    if let Some(output) = &cli.output {
        config.sequence.result_folder = output.clone();
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    let mut rng = match config.run.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut pipeline =
        HologramPipeline::from_config(&config).context("setting up hologram pipeline")?;
    let summary = pipeline.run(&mut rng).context("hologram run aborted")?;

    info!(
        written = summary.processed.len(),
        skipped = ?summary.skipped,
        folder = %config.sequence.result_folder.display(),
        "done"
    );
    Ok(())
}

fn main() -> ExitCode {
    init_tracing();
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
