//! # cotask
//!
//! Runs the balance-platform task set on the host against simulated
//! drivers, with the terminal as the command stream.
//!
//! Configuration comes from `--config <FILE>` (TOML) or built-in defaults.
//! Logs go to stderr so they do not interleave with console output.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use cotask_common::config::ConfigLoader;
use cotask_common::system::SystemConfig;
use cotask_runtime::console::{ConsoleHandle, StdinConsole};
use cotask_runtime::sim::SimPlatform;
use cotask_runtime::system::assemble;
use cotask_runtime::ticks::{SystemClock, TICKS_PER_SECOND, TickWidth};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// cotask: cooperative scheduler for the ball-balancing platform
#[derive(Parser, Debug)]
#[command(name = "cotask")]
#[command(version)]
#[command(about = "Cooperative round-robin scheduler with periodic state-machine tasks")]
struct Args {
    /// Path to the TOML configuration file. Defaults are used when absent.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            // Tracing is not installed yet.
            eprintln!("FATAL: {e}");
            process::exit(1);
        }
    };
    setup_tracing(&args, &config);

    info!(
        "cotask v{} starting ({})",
        env!("CARGO_PKG_VERSION"),
        config.shared.service_name
    );

    if let Err(e) = run(&config) {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("cotask shutdown complete");
}

fn load_config(args: &Args) -> Result<SystemConfig, Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => SystemConfig::load(path)
            .map_err(|e| format!("{}: {e}", path.display()))?,
        None => SystemConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn run(config: &SystemConfig) -> Result<(), Box<dyn std::error::Error>> {
    let width = TickWidth::new(config.scheduler.tick_bits)
        .ok_or_else(|| format!("invalid tick width {}", config.scheduler.tick_bits))?;
    let clock = SystemClock::new(width);
    let console: ConsoleHandle = std::rc::Rc::new(StdinConsole::spawn()?);

    let seconds = |ticks: u32| ticks as f32 / TICKS_PER_SECOND as f32;
    let platform = SimPlatform::new();
    platform.set_ball(30.0, -15.0);
    let drivers = platform.drivers(seconds(config.periods.motor), seconds(config.periods.encoder));

    let mut system = assemble(config, Box::new(clock), console, drivers);
    info!(
        tick_bits = width.bits(),
        tasks = system.scheduler.len(),
        "system ready, press Ctrl-C to stop"
    );

    let stop = Arc::new(AtomicBool::new(false));
    let s = stop.clone();
    ctrlc::set_handler(move || {
        s.store(true, Ordering::SeqCst);
    })?;

    system.scheduler.run(&stop)?;
    Ok(())
}

/// Install the tracing subscriber. `--verbose` wins over the configured level;
/// `RUST_LOG` directives are added on top.
fn setup_tracing(args: &Args, config: &SystemConfig) {
    let level = if args.verbose {
        "debug"
    } else {
        config.shared.log_level.as_directive()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }
}
