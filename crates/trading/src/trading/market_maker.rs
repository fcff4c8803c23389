//! Passive market making strategy
//!
//! Quotes both sides around the fair price. When the fair price sits at
//! least `threshold` away from a quote the strategy is happy to rest at the
//! current BBO; otherwise it backs the quote off by one price level.

use crate::trading::features::FeatureEngine;
use crate::trading::order_manager::OrderManager;
use crate::trading::position::PositionManager;
use crate::trading::risk::RiskManager;
use common::{Bbo, ClientResponse, Price, Side, TickerId, TradeEngineCfg};
use tracing::debug;

pub struct MarketMaker {
    cfgs: Vec<TradeEngineCfg>,
}

impl MarketMaker {
    #[must_use]
    pub fn new(cfgs: Vec<TradeEngineCfg>) -> Self {
        Self { cfgs }
    }

    pub fn on_order_book_update(
        &mut self,
        ticker_id: TickerId,
        price: Price,
        side: Side,
        bbo: &Bbo,
        features: &FeatureEngine,
        orders: &mut OrderManager,
        risk: &RiskManager,
        positions: &PositionManager,
    ) {
        let fair = features.market_price();
        if !bbo.is_two_sided() || fair.is_nan() {
            return;
        }
        debug!(ticker_id, price, %side, fair, %bbo, "market maker quoting");
        let cfg = &self.cfgs[ticker_id as usize];
        let bid = bbo.bid
            - if fair - bbo.bid as f64 >= cfg.threshold {
                0
            } else {
                1
            };
        let ask = bbo.ask
            + if bbo.ask as f64 - fair >= cfg.threshold {
                0
            } else {
                1
            };
        orders.manage_orders(risk, positions, ticker_id, bid, ask, cfg.trade_size);
    }

    pub fn on_order_response(&mut self, response: &ClientResponse, orders: &mut OrderManager) {
        orders.on_order_response(response);
    }
}
