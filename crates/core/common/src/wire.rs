//! Bit-packed wire frames
//!
//! Every frame is a fixed-size `#[repr(C, packed)]` struct prefixed by a
//! `u64` sequence number, so the wire size is stable across compilations and
//! a byte buffer can be peeled frame by frame. Exchange and clients are
//! co-located; fields travel in native (little-endian) byte order, exactly
//! as they sit in memory.

use crate::messages::{
    ClientRequest, ClientResponse, MarketUpdate, RequestKind, ResponseKind, UpdateKind,
};
use crate::types::Side;
use zerocopy::{AsBytes, FromBytes, Unaligned};

/// `{n_seq, ClientRequest}` as sent client -> exchange over TCP.
#[repr(C, packed)]
#[derive(Clone, Copy, FromBytes, AsBytes, Unaligned)]
pub struct WireClientRequest {
    pub n_seq: u64,
    pub kind: u8,
    pub client_id: u32,
    pub ticker_id: u32,
    pub order_id: u64,
    pub side: i8,
    pub price: i64,
    pub qty: u32,
}

/// Wire size of a framed client request.
pub const CLIENT_REQUEST_SIZE: usize = std::mem::size_of::<WireClientRequest>();

impl WireClientRequest {
    #[must_use]
    pub fn pack(n_seq: u64, req: &ClientRequest) -> Self {
        Self {
            n_seq,
            kind: req.kind as u8,
            client_id: req.client_id,
            ticker_id: req.ticker_id,
            order_id: req.order_id,
            side: req.side.to_wire(),
            price: req.price,
            qty: req.qty,
        }
    }

    #[must_use]
    pub fn unpack(&self) -> ClientRequest {
        ClientRequest {
            kind: RequestKind::from_wire(self.kind),
            client_id: self.client_id,
            ticker_id: self.ticker_id,
            order_id: self.order_id,
            side: Side::from_wire(self.side),
            price: self.price,
            qty: self.qty,
        }
    }
}

/// `{n_seq, ClientResponse}` as sent exchange -> client over TCP.
#[repr(C, packed)]
#[derive(Clone, Copy, FromBytes, AsBytes, Unaligned)]
pub struct WireClientResponse {
    pub n_seq: u64,
    pub kind: u8,
    pub client_id: u32,
    pub ticker_id: u32,
    pub client_order_id: u64,
    pub market_order_id: u64,
    pub side: i8,
    pub price: i64,
    pub qty_exec: u32,
    pub qty_remain: u32,
}

/// Wire size of a framed client response.
pub const CLIENT_RESPONSE_SIZE: usize = std::mem::size_of::<WireClientResponse>();

impl WireClientResponse {
    #[must_use]
    pub fn pack(n_seq: u64, resp: &ClientResponse) -> Self {
        Self {
            n_seq,
            kind: resp.kind as u8,
            client_id: resp.client_id,
            ticker_id: resp.ticker_id,
            client_order_id: resp.client_order_id,
            market_order_id: resp.market_order_id,
            side: resp.side.to_wire(),
            price: resp.price,
            qty_exec: resp.qty_exec,
            qty_remain: resp.qty_remain,
        }
    }

    #[must_use]
    pub fn unpack(&self) -> ClientResponse {
        ClientResponse {
            kind: ResponseKind::from_wire(self.kind),
            client_id: self.client_id,
            ticker_id: self.ticker_id,
            client_order_id: self.client_order_id,
            market_order_id: self.market_order_id,
            side: Side::from_wire(self.side),
            price: self.price,
            qty_exec: self.qty_exec,
            qty_remain: self.qty_remain,
        }
    }
}

/// `{n_seq, MarketUpdate}` as sent on both multicast groups.
#[repr(C, packed)]
#[derive(Clone, Copy, FromBytes, AsBytes, Unaligned)]
pub struct WireMarketUpdate {
    pub n_seq: u64,
    pub kind: u8,
    pub order_id: u64,
    pub ticker_id: u32,
    pub side: i8,
    pub price: i64,
    pub qty: u32,
    pub priority: u64,
}

/// Wire size of a framed market update.
pub const MARKET_UPDATE_SIZE: usize = std::mem::size_of::<WireMarketUpdate>();

impl WireMarketUpdate {
    #[must_use]
    pub fn pack(n_seq: u64, update: &MarketUpdate) -> Self {
        Self {
            n_seq,
            kind: update.kind as u8,
            order_id: update.order_id,
            ticker_id: update.ticker_id,
            side: update.side.to_wire(),
            price: update.price,
            qty: update.qty,
            priority: update.priority,
        }
    }

    #[must_use]
    pub fn unpack(&self) -> MarketUpdate {
        MarketUpdate {
            kind: UpdateKind::from_wire(self.kind),
            order_id: self.order_id,
            ticker_id: self.ticker_id,
            side: Side::from_wire(self.side),
            price: self.price,
            qty: self.qty,
            priority: self.priority,
        }
    }
}
