//! Velox trading client
//!
//! The participant half of the platform: consumes the sequenced market data
//! streams with gap recovery, reconstructs a replica order book per
//! instrument, computes trading features, and drives one strategy whose
//! orders flow back to the exchange through the gateway client under
//! position and risk accounting.

pub mod app;
pub mod data;
pub mod engine;
pub mod networking;
pub mod orders;
pub mod trading;

pub use engine::{Strategy, StrategyKind, TradingEngine};
pub use orders::ReplicaBook;
