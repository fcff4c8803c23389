//! Market data consumption and gap recovery

pub mod consumer;

pub use consumer::{ConsumerGroups, GapRecovery, MarketDataConsumer};
