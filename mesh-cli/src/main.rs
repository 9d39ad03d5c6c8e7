//! # bgp-mesh
//!
//! Provision a full-mesh BGP test fleet, load it, and report on it.
//!
//! ## Commands
//!
//! - `run`: provision → wait-for-ready → configure-mesh → inject-routes →
//!   run-performance-tests → upload-report
//! - `teardown`: destroy the fleet
//! - `render`: write each router's configuration locally without contacting it
//!
//! ## Example
//!
//! ```bash
//! bgp-mesh --config lab.toml run
//! bgp-mesh --config lab.toml render --out configs/
//! bgp-mesh --config lab.toml teardown
//! ```
//!
//! Exits 0 on full success and 1 if any stage fails.

use anyhow::{Context, Result};
use bgpmesh_fleet::Config;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod logging;

use logging::LogFormat;

/// Full-mesh BGP fleet test harness.
#[derive(Parser, Debug)]
#[command(name = "bgp-mesh")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (default: bgp-mesh.toml if it exists)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the whole pipeline against a fresh fleet
    Run,

    /// Destroy the fleet
    Teardown,

    /// Write per-router configuration files from the current provisioning outputs
    Render {
        /// Output directory
        #[arg(long, short)]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.log_format);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Run => commands::run::run(config).await,
        Commands::Teardown => commands::teardown::run(config).await,
        Commands::Render { out } => commands::render::run(config, &out).await,
    }
}
