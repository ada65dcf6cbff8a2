//! Pulseboard tasks - health checks and the result pipeline behind the status dashboard
//!
//! This library provides:
//! - The `Task`/`TaskResult` contracts every check shares
//! - The immutable registry mapping check ids to handlers
//! - The check handlers themselves (reachability, ping, HTTP, DNS, feed, media, counters)
//! - The atomic counter subsystem with optional durable mirroring

pub mod checks;
pub mod cidr;
pub mod config;
pub mod counter;
pub mod environment;
pub mod error;
pub mod params;
pub mod query;
pub mod registry;
pub mod task;
pub mod template;

// Re-export main types
pub use config::DashConfig;
pub use counter::{AtomicCounter, CounterHub, CounterStore, MemoryStore};
pub use environment::{Environment, ResultSink};
pub use error::{DispatchError, ParamError, StoreError};
pub use registry::{Category, TaskArgs, TaskHandler, TaskRegistry, TriggerMode};
pub use task::{CancelHandle, Spark, Task, TaskResult, Update};

/// Product name sent in the User-Agent of outbound requests
pub const PROJECT: &str = "Pulseboard";

/// Crate version, used in the User-Agent of outbound requests
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
