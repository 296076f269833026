//! Command-line runner for the combat simulator
//!
//! Reads a JSON configuration, runs it and prints the report as JSON on
//! stdout. Logs go to stderr; set `RUST_LOG` to change the level.

use anyhow::{Context, Result};
use clap::Parser;
use combat_simulator_core_rs::{Orchestrator, SimulationConfig};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Monte-Carlo combat simulator
#[derive(Parser)]
#[command(name = "combat-sim")]
#[command(about = "Run a combat simulation configuration", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the JSON configuration
    #[arg(short, long)]
    config: PathBuf,

    /// Override the configured iteration count
    #[arg(short, long)]
    iterations: Option<u64>,

    /// Override the worker count (0 = available parallelism)
    #[arg(short, long)]
    threads: Option<usize>,

    /// Override the base seed
    #[arg(short, long)]
    seed: Option<u64>,

    /// Run a single iteration and print its combat log instead of a report
    #[arg(long)]
    log_combat: bool,

    /// Pretty-print the report
    #[arg(long)]
    pretty: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging();

    let json = std::fs::read_to_string(&cli.config)
        .with_context(|| format!("Failed to read config file {}", cli.config.display()))?;
    let mut config = SimulationConfig::from_json(&json)
        .with_context(|| format!("Failed to parse config file {}", cli.config.display()))?;
    if let Some(iterations) = cli.iterations {
        config.iterations = iterations;
    }
    if let Some(threads) = cli.threads {
        config.threads = threads;
    }
    if let Some(seed) = cli.seed {
        config.seed = Some(seed);
    }

    let orchestrator = Orchestrator::new(config).context("Invalid configuration")?;

    if cli.log_combat {
        let log = orchestrator
            .sample_combat_log()
            .context("Combat log iteration failed")?;
        for event in log.events() {
            println!("{:>10} {:<16} {:?}", event.time().to_string(), event.kind(), event);
        }
        return Ok(());
    }

    let report = orchestrator.run().context("Simulation failed")?;
    let output = if cli.pretty {
        report.to_json_pretty()
    } else {
        report.to_json()
    }
    .context("Failed to serialize report")?;
    println!("{}", output);

    for warning in &report.warnings {
        tracing::warn!("{}", warning);
    }
    Ok(())
}

/// Stderr logging filtered by `RUST_LOG`, `info` when unset
fn setup_logging() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .init();
}
