//! `velox-trader` entry point

use anyhow::Result;
use chrono::Local;
use clap::Parser;
use common::config::{log_path, NetConfig};
use common::{Limits, RiskCfg, TradeEngineCfg};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;
use trading::app::{TraderApp, TraderConfig};
use trading::engine::StrategyKind;

#[derive(Parser)]
#[command(name = "velox-trader")]
#[command(about = "Velox trading client: market data consumer, strategy engine, order gateway")]
struct Cli {
    /// Participant id, dense in [0, max_clients)
    #[arg(long)]
    client_id: u32,

    /// Trading algorithm to run
    #[arg(long, value_enum, default_value = "market-maker")]
    algo: StrategyKind,

    /// Qty for each order the strategy places
    #[arg(long, default_value_t = 10)]
    trade_size: u32,

    /// Feature threshold the strategy trades against
    #[arg(long, default_value_t = 0.6)]
    threshold: f64,

    /// Largest single order qty risk will allow
    #[arg(long, default_value_t = 100)]
    size_max: u32,

    /// Largest absolute position risk will allow
    #[arg(long, default_value_t = 1000)]
    position_max: u32,

    /// PnL floor below which trading stops (negative)
    #[arg(long, default_value_t = -1000.0, allow_hyphen_values = true)]
    loss_max: f64,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn init_tracing(debug: bool) -> Result<()> {
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("trading={default_level},net=info")));
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

    info!("Velox Trader");
    info!("time: {}", Local::now().format("%Y-%m-%d %H:%M:%S"));

    let cfg = TraderConfig {
        net: NetConfig::from_env(),
        limits: Limits::default(),
        client_id: cli.client_id,
        strategy: cli.algo,
        engine_cfg: TradeEngineCfg {
            trade_size: cli.trade_size,
            threshold: cli.threshold,
            risk: RiskCfg {
                size_max: cli.size_max,
                position_max: cli.position_max,
                loss_max: cli.loss_max,
            },
        },
    };
    info!(?cfg, "configuration loaded");

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = Arc::clone(&interrupted);
        ctrlc::set_handler(move || {
            interrupted.store(true, Ordering::Release);
        })?;
    }

    let app = TraderApp::start(&cfg)?;
    while !interrupted.load(Ordering::Acquire) {
        std::thread::sleep(Duration::from_millis(100));
    }

    info!("SIGINT received, shutting down");
    app.stop();
    Ok(())
}
