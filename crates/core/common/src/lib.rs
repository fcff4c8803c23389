//! Core types shared by the Velox exchange and trading client
//!
//! Everything both processes must agree on lives here: semantic integer
//! types and sentinels, sizing limits, the ring message types, their
//! bit-packed wire frames, and configuration/time helpers.

pub mod config;
pub mod limits;
pub mod messages;
pub mod time;
pub mod types;
pub mod wire;

pub use limits::Limits;
pub use messages::{
    ClientRequest, ClientResponse, MarketUpdate, RequestKind, ResponseKind, SeqMarketUpdate,
    UpdateKind,
};
pub use types::{
    fmt_id, Bbo, ClientId, Nanos, OrderId, Price, Priority, Qty, RiskCfg, Side, TickerId,
    TradeEngineCfg, CLIENT_ID_INVALID, ORDER_ID_INVALID, PRICE_INVALID, PRIORITY_INVALID,
    QTY_INVALID, TICKER_ID_INVALID,
};
