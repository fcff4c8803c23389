//! Trading client wiring
//!
//! Owns the three client-side workers (market data consumer, trading
//! engine, order gateway client) and the rings between them. Shutdown stops
//! each ring's producer first so consumers drain.

use crate::data::{ConsumerGroups, MarketDataConsumer};
use crate::engine::{StrategyKind, TradingEngine};
use crate::networking::OrderGatewayClient;
use anyhow::{Context, Result};
use bus::SpscRing;
use common::config::NetConfig;
use common::{ClientId, ClientRequest, ClientResponse, Limits, MarketUpdate, TradeEngineCfg};
use std::net::SocketAddrV4;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Everything the trading client needs to come up.
#[derive(Debug, Clone)]
pub struct TraderConfig {
    pub net: NetConfig,
    pub limits: Limits,
    pub client_id: ClientId,
    pub strategy: StrategyKind,
    pub engine_cfg: TradeEngineCfg,
}

struct Worker {
    handle: JoinHandle<()>,
    running: Arc<AtomicBool>,
}

impl Worker {
    fn stop(self) {
        self.running.store(false, Ordering::Release);
        let name = self.handle.thread().name().unwrap_or("worker").to_string();
        if self.handle.join().is_err() {
            warn!(name = %name, "worker thread panicked");
        }
    }
}

fn spawn_flag() -> Arc<AtomicBool> {
    Arc::new(AtomicBool::new(true))
}

fn wait_for_drain<T>(ring: &SpscRing<T>, what: &str) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while ring.size() > 0 {
        if Instant::now() > deadline {
            warn!(what, remaining = ring.size(), "shutdown drain timed out");
            return;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
}

/// A running trading client.
pub struct TraderApp {
    mdc: Worker,
    te: Worker,
    ogc: Worker,
    market_updates: Arc<SpscRing<MarketUpdate>>,
    requests: Arc<SpscRing<ClientRequest>>,
}

impl TraderApp {
    /// Join the incremental stream, connect the gateway, start the engine.
    pub fn start(cfg: &TraderConfig) -> Result<Self> {
        let limits = cfg.limits;
        let requests: Arc<SpscRing<ClientRequest>> =
            Arc::new(SpscRing::new(limits.max_client_updates));
        let responses: Arc<SpscRing<ClientResponse>> =
            Arc::new(SpscRing::new(limits.max_client_updates));
        let market_updates: Arc<SpscRing<MarketUpdate>> =
            Arc::new(SpscRing::new(limits.max_market_updates));

        info!(client_id = cfg.client_id, "starting market data consumer");
        let mdc_flag = spawn_flag();
        let groups = ConsumerGroups {
            iface: cfg.net.iface,
            incremental_ip: cfg.net.incremental_ip,
            incremental_port: cfg.net.incremental_port,
            snapshot_ip: cfg.net.snapshot_ip,
            snapshot_port: cfg.net.snapshot_port,
        };
        let mdc = MarketDataConsumer::new(groups, Arc::clone(&market_updates), Arc::clone(&mdc_flag))
            .context("joining the incremental stream failed")?;
        let mdc = Worker {
            handle: mdc.start(),
            running: mdc_flag,
        };

        info!(client_id = cfg.client_id, "connecting order gateway");
        let ogc_flag = spawn_flag();
        let gateway_addr = SocketAddrV4::new(cfg.net.iface, cfg.net.order_gateway_port);
        let ogc = OrderGatewayClient::connect(
            cfg.client_id,
            gateway_addr,
            Arc::clone(&requests),
            Arc::clone(&responses),
            Arc::clone(&ogc_flag),
        )
        .context("order gateway connect failed")?;
        let ogc = Worker {
            handle: ogc.start(),
            running: ogc_flag,
        };

        info!(client_id = cfg.client_id, "starting trading engine");
        let te_flag = spawn_flag();
        let te = TradingEngine::new(
            cfg.client_id,
            &limits,
            cfg.engine_cfg,
            cfg.strategy,
            Arc::clone(&requests),
            Arc::clone(&responses),
            Arc::clone(&market_updates),
            Arc::clone(&te_flag),
        );
        let te = Worker {
            handle: te.start(),
            running: te_flag,
        };

        Ok(Self {
            mdc,
            te,
            ogc,
            market_updates,
            requests,
        })
    }

    /// Stop producers before consumers so every ring drains to empty.
    pub fn stop(self) {
        info!("stopping trading client");
        self.mdc.stop();
        wait_for_drain(&self.market_updates, "market update ring");
        self.te.stop();
        wait_for_drain(&self.requests, "request ring");
        self.ogc.stop();
        info!("trading client stopped");
    }
}
