//! Semantic types shared by the Velox exchange and trading client
//!
//! All identifiers are fixed-width integers whose maximum value is the
//! `INVALID` sentinel. They travel down the wire unchanged, so the widths
//! here are the wire widths.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique id of an order within a book.
pub type OrderId = u64;
/// `OrderId` sentinel for "no order".
pub const ORDER_ID_INVALID: OrderId = OrderId::MAX;

/// Dense instrument identifier in `[0, max_tickers)`.
pub type TickerId = u32;
/// `TickerId` sentinel.
pub const TICKER_ID_INVALID: TickerId = TickerId::MAX;

/// Dense participant identifier in `[0, max_clients)`.
pub type ClientId = u32;
/// `ClientId` sentinel.
pub const CLIENT_ID_INVALID: ClientId = ClientId::MAX;

/// Integer price level.
pub type Price = i64;
/// `Price` sentinel.
pub const PRICE_INVALID: Price = Price::MAX;

/// Integer order quantity.
pub type Qty = u32;
/// `Qty` sentinel.
pub const QTY_INVALID: Qty = Qty::MAX;

/// Position of an order in a price level's FIFO queue.
pub type Priority = u64;
/// `Priority` sentinel.
pub const PRIORITY_INVALID: Priority = Priority::MAX;

/// Nanosecond timestamp (monotonic or wall-clock depending on source).
pub type Nanos = i64;

/// Render a numeric id, mapping the max-value sentinel to `INVALID`.
///
/// Used by the `Display` impls of every message type so logs stay readable.
#[must_use]
pub fn fmt_id<T: PartialEq + Copy + fmt::Display>(value: T, invalid: T) -> String {
    if value == invalid {
        "INVALID".to_string()
    } else {
        value.to_string()
    }
}

/// Which side of the market an order rests on.
///
/// The discriminants (+1 buy, -1 sell) are the wire encoding and double as
/// the sign used in position arithmetic.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i8)]
pub enum Side {
    #[default]
    Invalid = 0,
    Buy = 1,
    Sell = -1,
}

impl Side {
    /// +1 for buy, -1 for sell. Multiplying executed qty by this yields the
    /// signed position delta.
    #[must_use]
    pub const fn sign(self) -> i64 {
        self as i8 as i64
    }

    /// Dense array index: buy = 0, sell = 1.
    ///
    /// # Panics
    /// Panics on `Side::Invalid`; sided state is only kept for real sides.
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Side::Buy => 0,
            Side::Sell => 1,
            Side::Invalid => panic!("Side::Invalid has no array index"),
        }
    }

    /// The opposing side. `Invalid` maps to itself.
    #[must_use]
    pub const fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
            Side::Invalid => Side::Invalid,
        }
    }

    /// Decode from the wire byte. Anything unknown is `Invalid`.
    #[must_use]
    pub const fn from_wire(raw: i8) -> Side {
        match raw {
            1 => Side::Buy,
            -1 => Side::Sell,
            _ => Side::Invalid,
        }
    }

    /// Encode to the wire byte.
    #[must_use]
    pub const fn to_wire(self) -> i8 {
        self as i8
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
            Side::Invalid => "INVALID",
        };
        write!(f, "{s}")
    }
}

/// Best bid/offer with aggregated head-level quantities.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bbo {
    pub bid: Price,
    pub ask: Price,
    pub bid_qty: Qty,
    pub ask_qty: Qty,
}

impl Default for Bbo {
    fn default() -> Self {
        Self {
            bid: PRICE_INVALID,
            ask: PRICE_INVALID,
            bid_qty: QTY_INVALID,
            ask_qty: QTY_INVALID,
        }
    }
}

impl Bbo {
    /// True when both sides of the top of book are present.
    #[must_use]
    pub fn is_two_sided(&self) -> bool {
        self.bid != PRICE_INVALID && self.ask != PRICE_INVALID
    }
}

impl fmt::Display for Bbo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{} x {}@{}",
            fmt_id(self.bid_qty, QTY_INVALID),
            fmt_id(self.bid, PRICE_INVALID),
            fmt_id(self.ask_qty, QTY_INVALID),
            fmt_id(self.ask, PRICE_INVALID),
        )
    }
}

/// Risk limits applied per instrument before an order leaves the client.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskCfg {
    /// Largest single order qty allowed out the door.
    pub size_max: Qty,
    /// Largest absolute position allowed after the order fills.
    pub position_max: Qty,
    /// Trading stops when total PnL drops below this (negative) floor.
    pub loss_max: f64,
}

/// Per-instrument trading parameters for one client engine.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeEngineCfg {
    /// Qty used for each order the strategy places.
    pub trade_size: Qty,
    /// Strategy-specific feature threshold.
    pub threshold: f64,
    pub risk: RiskCfg,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_sign_and_opposite() {
        assert_eq!(Side::Buy.sign(), 1);
        assert_eq!(Side::Sell.sign(), -1);
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(Side::Sell.opposite(), Side::Buy);
        assert_eq!(Side::from_wire(Side::Sell.to_wire()), Side::Sell);
        assert_eq!(Side::from_wire(7), Side::Invalid);
    }

    #[test]
    fn sentinel_formatting() {
        assert_eq!(fmt_id(PRICE_INVALID, PRICE_INVALID), "INVALID");
        assert_eq!(fmt_id(100 as Price, PRICE_INVALID), "100");
    }

    #[test]
    fn bbo_serde_round_trip() -> Result<(), Box<dyn std::error::Error>> {
        let bbo = Bbo {
            bid: 99,
            ask: 101,
            bid_qty: 10,
            ask_qty: 20,
        };
        let encoded = bincode::serialize(&bbo)?;
        let decoded: Bbo = bincode::deserialize(&encoded)?;
        assert_eq!(bbo, decoded);
        Ok(())
    }

    #[test]
    fn bbo_default_is_one_sided_invalid() {
        let bbo = Bbo::default();
        assert!(!bbo.is_two_sided());
        assert_eq!(format!("{bbo}"), "INVALID@INVALID x INVALID@INVALID");
    }
}
