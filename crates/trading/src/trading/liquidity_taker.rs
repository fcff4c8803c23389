//! Aggressive liquidity taking strategy
//!
//! Follows large trades: when a trade consumes at least `threshold` of the
//! liquidity resting on its far side, the strategy joins the move with an
//! aggressive order on the same side, priced to cross the spread.

use crate::trading::features::FeatureEngine;
use crate::trading::order_manager::OrderManager;
use crate::trading::position::PositionManager;
use crate::trading::risk::RiskManager;
use common::{Bbo, ClientResponse, MarketUpdate, Side, TradeEngineCfg, PRICE_INVALID};
use tracing::debug;

pub struct LiquidityTaker {
    cfgs: Vec<TradeEngineCfg>,
}

impl LiquidityTaker {
    #[must_use]
    pub fn new(cfgs: Vec<TradeEngineCfg>) -> Self {
        Self { cfgs }
    }

    pub fn on_trade_update(
        &mut self,
        update: &MarketUpdate,
        bbo: &Bbo,
        features: &FeatureEngine,
        orders: &mut OrderManager,
        risk: &RiskManager,
        positions: &PositionManager,
    ) {
        let ratio = features.agg_trade_qty_ratio();
        if !bbo.is_two_sided() || ratio.is_nan() {
            return;
        }
        debug!(%update, %bbo, ratio, "liquidity taker evaluating trade");
        let cfg = &self.cfgs[update.ticker_id as usize];
        if ratio >= cfg.threshold {
            // one aggressive order on the trade's side; the other side idles
            if update.side == Side::Buy {
                orders.manage_orders(
                    risk,
                    positions,
                    update.ticker_id,
                    bbo.ask,
                    PRICE_INVALID,
                    cfg.trade_size,
                );
            } else {
                orders.manage_orders(
                    risk,
                    positions,
                    update.ticker_id,
                    PRICE_INVALID,
                    bbo.bid,
                    cfg.trade_size,
                );
            }
        }
    }

    pub fn on_order_response(&mut self, response: &ClientResponse, orders: &mut OrderManager) {
        orders.on_order_response(response);
    }
}
