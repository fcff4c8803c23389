//! Exchange-side networking: order gateway and FIFO sequencer

pub mod gateway;
pub mod sequencer;

pub use gateway::OrderGatewayServer;
pub use sequencer::FifoSequencer;
