//! Lock-free primitives for Velox hot paths
//!
//! Two building blocks used everywhere threads meet or objects churn:
//! [`SpscRing`], the bounded single-producer/single-consumer ring that forms
//! every inter-thread boundary, and [`Pool`], the fixed-capacity arena that
//! backs every hot-path allocation.

pub mod pool;
pub mod spsc;

pub use pool::{Pool, PoolIdx, POOL_NIL};
pub use spsc::SpscRing;
