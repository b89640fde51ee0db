//! # netbar - system and network health sampler
//!
//! Samples CPU, memory, disk, battery, thermal, throughput, Wi-Fi and
//! latency once per interval, keeps a rolling history per metric and prints
//! a readout (or JSON) per cycle. Optionally serves Prometheus metrics.

mod app;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use netbar::config::Config;

use app::{App, OutputMode};

/// netbar - background telemetry sampler
#[derive(Parser, Debug)]
#[command(
    name = "netbar",
    version,
    about = "System and network health sampler with rolling history"
)]
struct Cli {
    /// Sampling interval in milliseconds (minimum 100)
    #[arg(long, value_name = "N")]
    interval_ms: Option<u64>,

    /// Samples kept per metric history window
    #[arg(long, value_name = "N")]
    history: Option<usize>,

    /// Print one JSON snapshot per line instead of the readout
    #[arg(long)]
    json: bool,

    /// Sample two cycles one interval apart, print, and exit
    #[arg(long)]
    once: bool,

    /// Enable Prometheus metrics endpoint on the given address (e.g. "0.0.0.0:9100")
    #[arg(long, value_name = "ADDR")]
    prometheus: Option<String>,

    /// Config file to use instead of ~/.config/netbar/config.toml
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    // Load and apply CLI overrides to config
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => Config::load(),
    };
    if let Some(ms) = cli.interval_ms {
        config.set_interval_ms(ms);
    }
    if let Some(depth) = cli.history {
        config.set_history_depth(depth);
    }
    if let Some(addr) = cli.prometheus {
        config.prometheus_addr = Some(addr);
    }

    let mode = OutputMode {
        json: cli.json,
        once: cli.once,
    };
    App::new(&config, mode)?.run().await
}
