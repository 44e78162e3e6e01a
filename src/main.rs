use std::path::PathBuf;

use anyhow::{ensure, Context, Result};
use clap::{Parser, ValueEnum};
use perimetry_core::Eye;
use perimetry_experiment::{PerimetryConfig, PerimetrySession};
use perimetry_timing::{HighPrecisionTimer, ManualTimer, Timer};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

mod app;
mod observer;

use app::PerimetryApp;
use observer::SimulatedObserver;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FirstEye {
    Right,
    Left,
    Random,
}

/// Kinetic perimetry session runner with a simulated subject
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// JSON configuration; built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory the per-eye CSV files are written to
    #[arg(short, long, default_value = ".")]
    export_dir: PathBuf,

    /// Seed for sequence shuffling, eye choice and the simulated subject
    #[arg(short, long)]
    seed: Option<u64>,

    #[arg(long, value_enum, default_value_t = FirstEye::Random)]
    first_eye: FirstEye,

    /// Host frame rate
    #[arg(long, default_value_t = 72.0)]
    fps: f64,

    /// Run against the wall clock instead of a simulated one
    #[arg(long)]
    realtime: bool,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    print_config: bool,

    /// Verbosity: -v for info, -vv for debug, and -vvv for trace
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| level.into()),
        )
        .init();
}

fn rng(seed: Option<u64>, stream: u64) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(stream)),
        None => StdRng::from_os_rng(),
    }
}

fn run<T: Timer<Timestamp = u64>>(cli: &Cli, config: PerimetryConfig, timer: T) -> Result<()> {
    let first_eye = match cli.first_eye {
        FirstEye::Right => Some(Eye::Right),
        FirstEye::Left => Some(Eye::Left),
        FirstEye::Random => None,
    };
    let observer = SimulatedObserver::new(rng(cli.seed, 1), config.reaction_time_s);
    let session = PerimetrySession::new(
        config,
        timer.clone(),
        rng(cli.seed, 0),
        cli.export_dir.clone(),
        first_eye,
    );
    info!(first_eye = %session.first_eye(), "starting session");

    let mut app = PerimetryApp::new(session, observer, timer, cli.fps);
    let summary = app.run()?;
    println!(
        "Session finished after {} frames, {} result file(s) written to {}",
        summary.frames,
        summary.exported.len(),
        cli.export_dir.display()
    );
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    ensure!(cli.fps > 0.0, "--fps must be positive, got {}", cli.fps);

    let config = match &cli.config {
        Some(path) => PerimetryConfig::load(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => PerimetryConfig::default(),
    };
    if cli.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }
    info!(
        vectors = config.vectors.len(),
        sizes = config.enabled_sizes().len(),
        randomize = config.randomize,
        "configuration loaded"
    );

    if cli.realtime {
        run(&cli, config, HighPrecisionTimer::new())
    } else {
        run(&cli, config, ManualTimer::new())
    }
}
