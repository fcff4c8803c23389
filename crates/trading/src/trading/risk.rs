//! Pre-trade risk checks

use crate::trading::position::PositionManager;
use common::{Limits, Qty, RiskCfg, Side, TickerId};
use std::fmt;

/// Outcome of a pre-trade risk check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskResult {
    SizeTooLarge,
    PositionTooLarge,
    LossTooLarge,
    Allowed,
}

impl fmt::Display for RiskResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskResult::SizeTooLarge => "SIZE_TOO_LARGE",
            RiskResult::PositionTooLarge => "POSITION_TOO_LARGE",
            RiskResult::LossTooLarge => "LOSS_TOO_LARGE",
            RiskResult::Allowed => "ALLOWED",
        };
        write!(f, "{s}")
    }
}

/// Per-instrument risk limits for one client.
pub struct RiskManager {
    cfgs: Vec<RiskCfg>,
}

impl RiskManager {
    /// Same limits for every instrument.
    #[must_use]
    pub fn new(limits: &Limits, cfg: RiskCfg) -> Self {
        Self {
            cfgs: vec![cfg; limits.max_tickers],
        }
    }

    /// Per-instrument limits.
    #[must_use]
    pub fn with_cfgs(cfgs: Vec<RiskCfg>) -> Self {
        Self { cfgs }
    }

    /// Vet a prospective order against size, resulting position and loss
    /// limits, in that order.
    #[must_use]
    pub fn check(
        &self,
        positions: &PositionManager,
        ticker_id: TickerId,
        side: Side,
        qty: Qty,
    ) -> RiskResult {
        let cfg = &self.cfgs[ticker_id as usize];
        let position = positions.position(ticker_id);
        if qty > cfg.size_max {
            return RiskResult::SizeTooLarge;
        }
        if (position.position + side.sign() * qty as i64).abs() > cfg.position_max as i64 {
            return RiskResult::PositionTooLarge;
        }
        if position.pnl_total < cfg.loss_max {
            return RiskResult::LossTooLarge;
        }
        RiskResult::Allowed
    }
}
