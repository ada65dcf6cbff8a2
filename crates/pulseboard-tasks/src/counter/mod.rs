//! Atomic counter subsystem.
//!
//! This module is responsible for:
//! - Keeping exactly one live counter per token
//! - Fanning every increment out to the token's subscribers, in order
//! - Mirroring counts to an optional durable store without blocking increments

pub mod hub;
pub mod store;
pub mod writer;

pub use hub::{AtomicCounter, CounterHub, SubscriptionId};
#[cfg(feature = "redis")]
pub use store::RedisStore;
pub use store::{CounterStore, MemoryStore};
pub use writer::StoreWriter;
