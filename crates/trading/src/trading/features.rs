//! Trading signal computation
//!
//! Two features drive the bundled strategies: a fair market price weighted
//! by opposite-side book quantity, and the ratio of an incoming trade's
//! size to the liquidity resting on the side it hits.

use common::{Bbo, MarketUpdate, Price, Side, TickerId};
use tracing::debug;

/// Value of a feature that has not been computed yet.
pub const FEATURE_INVALID: f64 = f64::NAN;

/// Signal state shared with the active strategy.
pub struct FeatureEngine {
    market_price: f64,
    agg_trade_qty_ratio: f64,
}

impl Default for FeatureEngine {
    fn default() -> Self {
        Self {
            market_price: FEATURE_INVALID,
            agg_trade_qty_ratio: FEATURE_INVALID,
        }
    }
}

impl FeatureEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute the fair price from the top of book.
    ///
    /// `P = (bid * ask_qty + ask * bid_qty) / (bid_qty + ask_qty)` leans the
    /// price towards the ask when buy interest dominates and towards the
    /// bid when sell interest dominates.
    pub fn on_order_book_update(&mut self, ticker_id: TickerId, price: Price, side: Side, bbo: &Bbo) {
        if bbo.is_two_sided() {
            self.market_price = (bbo.bid as f64 * bbo.ask_qty as f64
                + bbo.ask as f64 * bbo.bid_qty as f64)
                / (bbo.bid_qty as f64 + bbo.ask_qty as f64);
        }
        debug!(
            ticker_id,
            price,
            %side,
            market_price = self.market_price,
            agg_ratio = self.agg_trade_qty_ratio,
            "features updated on book change"
        );
    }

    /// Recompute trade pressure: how large this trade is relative to the
    /// liquidity on the other side of it.
    pub fn on_trade_update(&mut self, update: &MarketUpdate, bbo: &Bbo) {
        if bbo.is_two_sided() {
            let far_qty = match update.side {
                Side::Buy => bbo.ask_qty,
                _ => bbo.bid_qty,
            };
            self.agg_trade_qty_ratio = update.qty as f64 / far_qty as f64;
        }
        debug!(
            %update,
            market_price = self.market_price,
            agg_ratio = self.agg_trade_qty_ratio,
            "features updated on trade"
        );
    }

    #[must_use]
    pub fn market_price(&self) -> f64 {
        self.market_price
    }

    #[must_use]
    pub fn agg_trade_qty_ratio(&self) -> f64 {
        self.agg_trade_qty_ratio
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::UpdateKind;

    fn bbo(bid: i64, bid_qty: u32, ask: i64, ask_qty: u32) -> Bbo {
        Bbo {
            bid,
            ask,
            bid_qty,
            ask_qty,
        }
    }

    #[test]
    fn fair_price_leans_towards_heavier_side() {
        let mut feng = FeatureEngine::new();
        // more bid qty than ask qty pulls the fair price towards the ask
        feng.on_order_book_update(0, 100, Side::Buy, &bbo(100, 300, 102, 100));
        let fair = feng.market_price();
        assert!(fair > 101.0 && fair < 102.0, "fair price was {fair}");
    }

    #[test]
    fn one_sided_book_leaves_features_invalid() {
        let mut feng = FeatureEngine::new();
        let one_sided = Bbo {
            bid: 100,
            bid_qty: 10,
            ..Bbo::default()
        };
        feng.on_order_book_update(0, 100, Side::Buy, &one_sided);
        assert!(feng.market_price().is_nan());
    }

    #[test]
    fn trade_ratio_uses_far_side_liquidity() {
        let mut feng = FeatureEngine::new();
        let update = MarketUpdate {
            kind: UpdateKind::Trade,
            side: Side::Buy,
            qty: 50,
            ..MarketUpdate::default()
        };
        feng.on_trade_update(&update, &bbo(100, 10, 102, 200));
        assert!((feng.agg_trade_qty_ratio() - 0.25).abs() < f64::EPSILON);
    }
}
