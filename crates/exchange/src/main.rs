//! `velox-exchange` entry point

use anyhow::Result;
use chrono::Local;
use clap::Parser;
use common::config::{log_path, NetConfig};
use common::Limits;
use exchange::server::{ExchangeConfig, ExchangeServer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "velox-exchange")]
#[command(about = "Velox exchange: matching engine, order gateway and market data")]
struct Cli {
    /// Seconds between snapshot publications
    #[arg(long, default_value_t = 60)]
    snapshot_secs: u64,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn init_tracing(debug: bool) -> Result<()> {
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("exchange={default_level},net=info")));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    match log_path() {
        Some(path) => {
            let file = std::fs::File::create(&path)?;
            builder.with_ansi(false).with_writer(Arc::new(file)).init();
        }
        None => builder.init(),
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug)?;

    info!("Velox Exchange");
    info!("time: {}", Local::now().format("%Y-%m-%d %H:%M:%S"));

    let cfg = ExchangeConfig {
        net: NetConfig::from_env(),
        limits: Limits::default(),
        snapshot_interval: Duration::from_secs(cli.snapshot_secs),
    };
    info!(?cfg, "configuration loaded");

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = Arc::clone(&interrupted);
        ctrlc::set_handler(move || {
            interrupted.store(true, Ordering::Release);
        })?;
    }

    let server = ExchangeServer::start(&cfg)?;
    while !interrupted.load(Ordering::Acquire) {
        std::thread::sleep(Duration::from_millis(100));
    }

    info!("SIGINT received, shutting down");
    server.stop();
    Ok(())
}
