//! Position and PnL accounting
//!
//! One `Position` per instrument. The open side of a position is tracked as
//! a price-times-quantity sum per side (`vwap_open`); dividing by the
//! absolute position yields the true VWAP. Realized PnL moves only when a
//! fill reduces or flips the position; unrealized PnL is marked against the
//! latest fill price or, on BBO changes, the mid price.

use common::{Bbo, ClientResponse, Limits, Qty, Side, TickerId};
use tracing::debug;

/// Position state for a single instrument.
#[derive(Debug, Default, Clone)]
pub struct Position {
    /// Signed open position in units of the instrument.
    pub position: i64,
    pub pnl_real: f64,
    pub pnl_unreal: f64,
    pub pnl_total: f64,
    /// Open price*qty sums, indexed by `Side::index()`.
    pub vwap_open: [f64; 2],
    /// Total qty traded over the life of this position.
    pub volume: Qty,
    /// Last observed top of book.
    pub bbo: Bbo,
}

impl Position {
    /// Fold one fill into the position.
    pub fn add_fill(&mut self, response: &ClientResponse) {
        let position_old = self.position;
        let i_side = response.side.index();
        let i_opp = response.side.opposite().index();
        let side_value = response.side.sign();
        let exec = response.qty_exec as i64;

        self.position += exec * side_value;
        self.volume += response.qty_exec;

        let opened_or_increased = position_old * side_value >= 0;
        if opened_or_increased {
            // the open sum grows; realized PnL is untouched
            self.vwap_open[i_side] += (response.price * exec) as f64;
        } else {
            // the fill closes part of the opposite-side exposure
            let vwap_opposite = self.vwap_open[i_opp] / position_old.abs() as f64;
            self.vwap_open[i_opp] = vwap_opposite * self.position.abs() as f64;
            self.pnl_real += exec.min(position_old.abs()) as f64
                * side_value as f64
                * (vwap_opposite - response.price as f64);
            if self.position * position_old < 0 {
                // sign flipped: the remainder opens fresh on the fill side
                self.vwap_open[i_side] = response.price as f64 * self.position.abs() as f64;
                self.vwap_open[i_opp] = 0.0;
            }
        }

        if self.position == 0 {
            self.vwap_open = [0.0, 0.0];
            self.pnl_unreal = 0.0;
        } else {
            let abs = self.position.abs() as f64;
            self.pnl_unreal = if self.position > 0 {
                (response.price as f64 - self.vwap_open[Side::Buy.index()] / abs) * abs
            } else {
                (self.vwap_open[Side::Sell.index()] / abs - response.price as f64) * abs
            };
        }
        self.pnl_total = self.pnl_unreal + self.pnl_real;

        debug!(
            position = self.position,
            real = self.pnl_real,
            unreal = self.pnl_unreal,
            total = self.pnl_total,
            volume = self.volume,
            response = %response,
            "fill applied"
        );
    }

    /// Re-mark unrealized PnL at the mid price when the top of book moves.
    pub fn on_bbo_update(&mut self, bbo: &Bbo) {
        self.bbo = *bbo;
        if self.position != 0 && bbo.is_two_sided() {
            let mid = (bbo.bid + bbo.ask) as f64 * 0.5;
            let abs = self.position.abs() as f64;
            self.pnl_unreal = if self.position > 0 {
                (mid - self.vwap_open[Side::Buy.index()] / abs) * abs
            } else {
                (self.vwap_open[Side::Sell.index()] / abs - mid) * abs
            };
            self.pnl_total = self.pnl_unreal + self.pnl_real;
        }
    }
}

/// All positions of one trading client.
pub struct PositionManager {
    positions: Vec<Position>,
}

impl PositionManager {
    #[must_use]
    pub fn new(limits: &Limits) -> Self {
        Self {
            positions: vec![Position::default(); limits.max_tickers],
        }
    }

    pub fn add_fill(&mut self, response: &ClientResponse) {
        self.positions[response.ticker_id as usize].add_fill(response);
    }

    pub fn on_bbo_update(&mut self, ticker_id: TickerId, bbo: &Bbo) {
        self.positions[ticker_id as usize].on_bbo_update(bbo);
    }

    #[must_use]
    pub fn position(&self, ticker_id: TickerId) -> &Position {
        &self.positions[ticker_id as usize]
    }

    /// Summed PnL and volume across every instrument.
    #[must_use]
    pub fn totals(&self) -> (f64, Qty) {
        let mut pnl = 0.0;
        let mut volume: Qty = 0;
        for p in &self.positions {
            pnl += p.pnl_total;
            volume += p.volume;
        }
        (pnl, volume)
    }
}
