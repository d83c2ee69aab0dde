//! Herald Bridge - Pub/sub transport for cross-process event delivery
//!
//! This crate provides:
//! - The `PubSub` trait a distributed broker implements
//! - Queue-group subscriptions delivering raw event payloads
//! - An in-memory broker for tests and single-process setups

pub mod pubsub;
pub mod memory;

pub use pubsub::*;
pub use memory::{MemoryPubSub, DEFAULT_CHANNEL_CAPACITY};
