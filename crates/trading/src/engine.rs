//! Trading engine
//!
//! Owns one replica book per instrument plus the feature, position, risk
//! and order management state, and drives exactly one strategy. The engine
//! thread drains the response ring and the market update ring; fills reach
//! the position manager before the strategy hears about them.

use crate::orders::ReplicaBook;
use crate::trading::{
    FeatureEngine, LiquidityTaker, MarketMaker, OrderManager, PositionManager, RiskManager,
};
use bus::SpscRing;
use common::{
    ClientId, ClientRequest, ClientResponse, Limits, MarketUpdate, ResponseKind, TradeEngineCfg,
    UpdateKind,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info, info_span};

/// The single active trading algorithm, dispatched statically.
pub enum Strategy {
    MarketMaker(MarketMaker),
    LiquidityTaker(LiquidityTaker),
}

/// Client-side trading engine worker.
pub struct TradingEngine {
    client_id: ClientId,
    books: Vec<ReplicaBook>,
    features: FeatureEngine,
    positions: PositionManager,
    risk: RiskManager,
    orders: OrderManager,
    strategy: Strategy,
    rx_responses: Arc<SpscRing<ClientResponse>>,
    rx_updates: Arc<SpscRing<MarketUpdate>>,
    running: Arc<AtomicBool>,
}

impl TradingEngine {
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        client_id: ClientId,
        limits: &Limits,
        cfg: TradeEngineCfg,
        strategy_kind: StrategyKind,
        tx_requests: Arc<SpscRing<ClientRequest>>,
        rx_responses: Arc<SpscRing<ClientResponse>>,
        rx_updates: Arc<SpscRing<MarketUpdate>>,
        running: Arc<AtomicBool>,
    ) -> Self {
        let books = (0..limits.max_tickers)
            .map(|ticker| ReplicaBook::new(ticker as u32, limits))
            .collect();
        let cfgs = vec![cfg; limits.max_tickers];
        let strategy = match strategy_kind {
            StrategyKind::MarketMaker => Strategy::MarketMaker(MarketMaker::new(cfgs)),
            StrategyKind::LiquidityTaker => Strategy::LiquidityTaker(LiquidityTaker::new(cfgs)),
        };
        info!(client_id, ?strategy_kind, ?cfg, "trading engine configured");
        Self {
            client_id,
            books,
            features: FeatureEngine::new(),
            positions: PositionManager::new(limits),
            risk: RiskManager::new(limits, cfg.risk),
            orders: OrderManager::new(client_id, limits, tx_requests),
            strategy,
            rx_responses,
            rx_updates,
            running,
        }
    }

    /// Route one market update through the replica book, features and the
    /// strategy.
    pub fn on_market_update(&mut self, update: &MarketUpdate) {
        let ticker = update.ticker_id as usize;
        assert!(ticker < self.books.len(), "update for out-of-range ticker");
        let book = &mut self.books[ticker];

        if update.kind == UpdateKind::Trade {
            // trades never alter the replica book
            let bbo = *book.bbo();
            self.features.on_trade_update(update, &bbo);
            if let Strategy::LiquidityTaker(taker) = &mut self.strategy {
                taker.on_trade_update(
                    update,
                    &bbo,
                    &self.features,
                    &mut self.orders,
                    &self.risk,
                    &self.positions,
                );
            }
            return;
        }

        let bbo_changed = book.apply(update);
        let bbo = *book.bbo();
        if bbo_changed {
            self.positions.on_bbo_update(update.ticker_id, &bbo);
        }
        self.features
            .on_order_book_update(update.ticker_id, update.price, update.side, &bbo);
        if let Strategy::MarketMaker(maker) = &mut self.strategy {
            maker.on_order_book_update(
                update.ticker_id,
                update.price,
                update.side,
                &bbo,
                &self.features,
                &mut self.orders,
                &self.risk,
                &self.positions,
            );
        }
    }

    /// Route one order response: fills mark the position first, then the
    /// strategy (and through it the order manager) sees the response.
    pub fn on_order_response(&mut self, response: &ClientResponse) {
        if response.kind == ResponseKind::Filled {
            self.positions.add_fill(response);
        }
        match &mut self.strategy {
            Strategy::MarketMaker(maker) => maker.on_order_response(response, &mut self.orders),
            Strategy::LiquidityTaker(taker) => taker.on_order_response(response, &mut self.orders),
        }
    }

    /// Spin on both inbound rings until the running flag clears.
    pub fn run(&mut self) {
        info!(client_id = self.client_id, "trading engine running");
        while self.running.load(Ordering::Acquire) {
            while let Some(response) = self.rx_responses.next_read() {
                let response = *response;
                self.rx_responses.commit_read();
                debug!(%response, "rx response");
                self.on_order_response(&response);
            }
            while let Some(update) = self.rx_updates.next_read() {
                let update = *update;
                self.rx_updates.commit_read();
                debug!(%update, "rx update");
                self.on_market_update(&update);
            }
        }
        let (pnl, volume) = self.positions.totals();
        info!(pnl, volume, "trading engine stopped");
    }

    /// Move the engine onto its own named worker thread.
    pub fn start(mut self) -> JoinHandle<()> {
        std::thread::Builder::new()
            .name("te".into())
            .spawn(move || {
                let span = info_span!("te");
                let _guard = span.enter();
                self.run();
            })
            .expect("failed to spawn trading engine thread")
    }

    // ---- component access for wiring and tests ----

    #[must_use]
    pub fn book(&self, ticker_id: u32) -> &ReplicaBook {
        &self.books[ticker_id as usize]
    }

    #[must_use]
    pub fn positions(&self) -> &PositionManager {
        &self.positions
    }

    #[must_use]
    pub fn orders(&self) -> &OrderManager {
        &self.orders
    }
}

/// Which bundled algorithm to run; exactly one is active per client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StrategyKind {
    MarketMaker,
    LiquidityTaker,
}
