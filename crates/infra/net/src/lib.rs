//! Thin non-blocking socket wrappers
//!
//! The trading hot paths poll; nothing here blocks. TCP carries the order
//! gateway traffic, UDP multicast carries market data. These wrappers stay
//! deliberately small: framing, sequencing and recovery all live with their
//! owning components.

pub mod mcast;
pub mod tcp;

pub use mcast::{McastReceiver, McastSender};
pub use tcp::{TcpClient, TcpServer};

use thiserror::Error;

/// Socket setup failures. Runtime I/O uses `std::io` results directly.
#[derive(Debug, Error)]
pub enum NetError {
    #[error("bind to {addr} failed: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    #[error("multicast join of {group} failed: {source}")]
    Join {
        group: String,
        source: std::io::Error,
    },
}
