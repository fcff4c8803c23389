//! Market data dissemination: incremental publisher and snapshot stream

pub mod publisher;
pub mod synthesizer;

pub use publisher::MarketDataPublisher;
pub use synthesizer::SnapshotSynthesizer;
