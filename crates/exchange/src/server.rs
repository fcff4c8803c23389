//! Exchange process wiring
//!
//! Owns the inter-thread rings and the four workers: matching engine, order
//! gateway, market data publisher and snapshot synthesizer. Shutdown stops
//! each ring's producer first and lets the consumer drain before it too is
//! stopped.

use crate::data::{MarketDataPublisher, SnapshotSynthesizer};
use crate::engine::MatchingEngine;
use crate::networking::OrderGatewayServer;
use anyhow::{Context, Result};
use bus::SpscRing;
use common::config::NetConfig;
use common::{ClientRequest, ClientResponse, Limits, MarketUpdate, SeqMarketUpdate};
use net::McastSender;
use std::net::SocketAddrV4;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Everything the exchange process needs to come up.
#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    pub net: NetConfig,
    pub limits: Limits,
    pub snapshot_interval: Duration,
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

/// A running exchange.
pub struct ExchangeServer {
    ome: Worker,
    ogs: Worker,
    mdp: Worker,
    ss: Worker,
    client_requests: Arc<SpscRing<ClientRequest>>,
    market_updates: Arc<SpscRing<MarketUpdate>>,
    snapshot_feed: Arc<SpscRing<SeqMarketUpdate>>,
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

impl ExchangeServer {
    /// Build the rings, start every worker, and return the running server.
    pub fn start(cfg: &ExchangeConfig) -> Result<Self> {
        let limits = cfg.limits;
        let client_requests: Arc<SpscRing<ClientRequest>> =
            Arc::new(SpscRing::new(limits.max_client_updates));
        let client_responses: Arc<SpscRing<ClientResponse>> =
            Arc::new(SpscRing::new(limits.max_client_updates));
        let market_updates: Arc<SpscRing<MarketUpdate>> =
            Arc::new(SpscRing::new(limits.max_market_updates));
        let snapshot_feed: Arc<SpscRing<SeqMarketUpdate>> =
            Arc::new(SpscRing::new(limits.max_market_updates));

        info!("starting matching engine");
        let ome_flag = spawn_flag();
        let ome = MatchingEngine::new(
            &limits,
            Arc::clone(&client_requests),
            Arc::clone(&client_responses),
            Arc::clone(&market_updates),
            Arc::clone(&ome_flag),
        );
        let ome = Worker {
            handle: ome.start(),
            running: ome_flag,
        };

        info!("starting order gateway");
        let ogs_flag = spawn_flag();
        let gateway_addr = SocketAddrV4::new(cfg.net.iface, cfg.net.order_gateway_port);
        let ogs = OrderGatewayServer::new(
            gateway_addr,
            &limits,
            Arc::clone(&client_requests),
            Arc::clone(&client_responses),
            Arc::clone(&ogs_flag),
        )
        .context("order gateway listen failed")?;
        let ogs = Worker {
            handle: ogs.start(),
            running: ogs_flag,
        };

        info!("starting market data publisher");
        let mdp_flag = spawn_flag();
        let incremental = McastSender::new(SocketAddrV4::new(
            cfg.net.incremental_ip,
            cfg.net.incremental_port,
        ))
        .context("incremental multicast socket failed")?;
        let mdp = MarketDataPublisher::new(
            Arc::clone(&market_updates),
            Arc::clone(&snapshot_feed),
            incremental,
            Arc::clone(&mdp_flag),
        );
        let mdp = Worker {
            handle: mdp.start(),
            running: mdp_flag,
        };

        info!("starting snapshot synthesizer");
        let ss_flag = spawn_flag();
        let snapshot = McastSender::new(SocketAddrV4::new(
            cfg.net.snapshot_ip,
            cfg.net.snapshot_port,
        ))
        .context("snapshot multicast socket failed")?;
        let ss = SnapshotSynthesizer::new(
            &limits,
            Arc::clone(&snapshot_feed),
            snapshot,
            cfg.snapshot_interval,
            Arc::clone(&ss_flag),
        );
        let ss = Worker {
            handle: ss.start(),
            running: ss_flag,
        };

        Ok(Self {
            ome,
            ogs,
            mdp,
            ss,
            client_requests,
            market_updates,
            snapshot_feed,
        })
    }

    /// Stop producers before consumers so every ring drains to empty.
    pub fn stop(self) {
        info!("stopping exchange");
        self.ogs.stop();
        wait_for_drain(&self.client_requests, "client request ring");
        self.ome.stop();
        wait_for_drain(&self.market_updates, "market update ring");
        self.mdp.stop();
        wait_for_drain(&self.snapshot_feed, "snapshot feed ring");
        self.ss.stop();
        info!("exchange stopped");
    }
}
