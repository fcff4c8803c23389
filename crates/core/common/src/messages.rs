//! Messages exchanged between the matching engine, gateways and market data
//!
//! These are the in-process forms carried on the inter-thread rings. Their
//! bit-packed wire counterparts live in [`crate::wire`].

use crate::types::{
    fmt_id, ClientId, OrderId, Price, Priority, Qty, Side, TickerId, CLIENT_ID_INVALID,
    ORDER_ID_INVALID, PRICE_INVALID, PRIORITY_INVALID, QTY_INVALID, TICKER_ID_INVALID,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a client is asking the exchange to do.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum RequestKind {
    #[default]
    Invalid = 0,
    New = 1,
    Cancel = 2,
}

impl RequestKind {
    #[must_use]
    pub const fn from_wire(raw: u8) -> Self {
        match raw {
            1 => RequestKind::New,
            2 => RequestKind::Cancel,
            _ => RequestKind::Invalid,
        }
    }
}

/// An order request as the matching engine consumes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRequest {
    pub kind: RequestKind,
    pub client_id: ClientId,
    pub ticker_id: TickerId,
    /// Client-assigned order id, unique per client.
    pub order_id: OrderId,
    pub side: Side,
    pub price: Price,
    pub qty: Qty,
}

impl Default for ClientRequest {
    fn default() -> Self {
        Self {
            kind: RequestKind::Invalid,
            client_id: CLIENT_ID_INVALID,
            ticker_id: TICKER_ID_INVALID,
            order_id: ORDER_ID_INVALID,
            side: Side::Invalid,
            price: PRICE_INVALID,
            qty: QTY_INVALID,
        }
    }
}

impl fmt::Display for ClientRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<Request> [{:?} cid:{} tid:{} oid:{} {} {}@{}]",
            self.kind,
            fmt_id(self.client_id, CLIENT_ID_INVALID),
            fmt_id(self.ticker_id, TICKER_ID_INVALID),
            fmt_id(self.order_id, ORDER_ID_INVALID),
            self.side,
            fmt_id(self.qty, QTY_INVALID),
            fmt_id(self.price, PRICE_INVALID),
        )
    }
}

/// How the exchange answered a client request.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ResponseKind {
    #[default]
    Invalid = 0,
    Accepted = 1,
    Cancelled = 2,
    Filled = 3,
    CancelRejected = 4,
}

impl ResponseKind {
    #[must_use]
    pub const fn from_wire(raw: u8) -> Self {
        match raw {
            1 => ResponseKind::Accepted,
            2 => ResponseKind::Cancelled,
            3 => ResponseKind::Filled,
            4 => ResponseKind::CancelRejected,
            _ => ResponseKind::Invalid,
        }
    }
}

/// An order response as produced by the matching engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientResponse {
    pub kind: ResponseKind,
    pub client_id: ClientId,
    pub ticker_id: TickerId,
    /// The id the client assigned to the order.
    pub client_order_id: OrderId,
    /// The id the matching engine assigned, unique within the instrument.
    pub market_order_id: OrderId,
    pub side: Side,
    pub price: Price,
    /// Qty executed by the event this response reports.
    pub qty_exec: Qty,
    /// Qty still live after the event.
    pub qty_remain: Qty,
}

impl Default for ClientResponse {
    fn default() -> Self {
        Self {
            kind: ResponseKind::Invalid,
            client_id: CLIENT_ID_INVALID,
            ticker_id: TICKER_ID_INVALID,
            client_order_id: ORDER_ID_INVALID,
            market_order_id: ORDER_ID_INVALID,
            side: Side::Invalid,
            price: PRICE_INVALID,
            qty_exec: QTY_INVALID,
            qty_remain: QTY_INVALID,
        }
    }
}

impl fmt::Display for ClientResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<Response> [{:?} cid:{} tid:{} coid:{} moid:{} {} exec:{} remain:{} @{}]",
            self.kind,
            fmt_id(self.client_id, CLIENT_ID_INVALID),
            fmt_id(self.ticker_id, TICKER_ID_INVALID),
            fmt_id(self.client_order_id, ORDER_ID_INVALID),
            fmt_id(self.market_order_id, ORDER_ID_INVALID),
            self.side,
            fmt_id(self.qty_exec, QTY_INVALID),
            fmt_id(self.qty_remain, QTY_INVALID),
            fmt_id(self.price, PRICE_INVALID),
        )
    }
}

/// Kind of public market data event.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum UpdateKind {
    #[default]
    Invalid = 0,
    /// Drop every order and level for the instrument (snapshot preamble).
    Clear = 1,
    Add = 2,
    Modify = 3,
    Cancel = 4,
    Trade = 5,
    /// Snapshot delimiter; `order_id` carries the consistent incremental seq.
    SnapshotStart = 6,
    /// Snapshot delimiter; `order_id` carries the consistent incremental seq.
    SnapshotEnd = 7,
}

impl UpdateKind {
    #[must_use]
    pub const fn from_wire(raw: u8) -> Self {
        match raw {
            1 => UpdateKind::Clear,
            2 => UpdateKind::Add,
            3 => UpdateKind::Modify,
            4 => UpdateKind::Cancel,
            5 => UpdateKind::Trade,
            6 => UpdateKind::SnapshotStart,
            7 => UpdateKind::SnapshotEnd,
            _ => UpdateKind::Invalid,
        }
    }
}

/// One event on the public market data stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketUpdate {
    pub kind: UpdateKind,
    /// Market order id; `INVALID` on trades, incremental seq on snapshot
    /// delimiters.
    pub order_id: OrderId,
    pub ticker_id: TickerId,
    pub side: Side,
    pub price: Price,
    pub qty: Qty,
    pub priority: Priority,
}

impl Default for MarketUpdate {
    fn default() -> Self {
        Self {
            kind: UpdateKind::Invalid,
            order_id: ORDER_ID_INVALID,
            ticker_id: TICKER_ID_INVALID,
            side: Side::Invalid,
            price: PRICE_INVALID,
            qty: QTY_INVALID,
            priority: PRIORITY_INVALID,
        }
    }
}

impl MarketUpdate {
    /// Snapshot delimiter constructor; `last_seq` rides in `order_id`.
    #[must_use]
    pub fn snapshot_sentinel(kind: UpdateKind, last_seq: u64) -> Self {
        debug_assert!(matches!(
            kind,
            UpdateKind::SnapshotStart | UpdateKind::SnapshotEnd
        ));
        Self {
            kind,
            order_id: last_seq,
            ..Self::default()
        }
    }

    /// `CLEAR` event for one instrument.
    #[must_use]
    pub fn clear(ticker_id: TickerId) -> Self {
        Self {
            kind: UpdateKind::Clear,
            ticker_id,
            ..Self::default()
        }
    }
}

impl fmt::Display for MarketUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<Update> [{:?} oid:{} tid:{} {} {}@{} prio:{}]",
            self.kind,
            fmt_id(self.order_id, ORDER_ID_INVALID),
            fmt_id(self.ticker_id, TICKER_ID_INVALID),
            self.side,
            fmt_id(self.qty, QTY_INVALID),
            fmt_id(self.price, PRICE_INVALID),
            fmt_id(self.priority, PRIORITY_INVALID),
        )
    }
}

/// A market update paired with its incremental stream sequence number, as
/// carried between the publisher and the snapshot synthesizer.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeqMarketUpdate {
    pub n_seq: u64,
    pub update: MarketUpdate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_all_invalid() {
        let req = ClientRequest::default();
        assert_eq!(req.kind, RequestKind::Invalid);
        assert_eq!(req.order_id, ORDER_ID_INVALID);
        let resp = ClientResponse::default();
        assert_eq!(resp.market_order_id, ORDER_ID_INVALID);
        assert_eq!(resp.side, Side::Invalid);
        let update = MarketUpdate::default();
        assert_eq!(update.priority, PRIORITY_INVALID);
    }

    #[test]
    fn snapshot_sentinel_carries_seq_in_order_id() {
        let start = MarketUpdate::snapshot_sentinel(UpdateKind::SnapshotStart, 41);
        assert_eq!(start.order_id, 41);
        assert_eq!(start.ticker_id, TICKER_ID_INVALID);
    }

    #[test]
    fn request_serde_round_trip() -> Result<(), Box<dyn std::error::Error>> {
        let req = ClientRequest {
            kind: RequestKind::New,
            client_id: 3,
            ticker_id: 1,
            order_id: 7,
            side: Side::Buy,
            price: 100,
            qty: 50,
        };
        let encoded = bincode::serialize(&req)?;
        let decoded: ClientRequest = bincode::deserialize(&encoded)?;
        assert_eq!(req, decoded);
        Ok(())
    }
}
