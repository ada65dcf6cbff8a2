//! Task definitions and the result envelope shared by every check.
//!
//! A [`Task`] is owned by the scheduler; checks only read it and may trip its
//! [`CancelHandle`]. Each execution produces a fresh [`TaskResult`].

mod result;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use result::{DEFAULT_EVENT, FeedItem, FeedUpdate, PingUpdate, Spark, TaskResult, Update};

/// Raw, heterogeneous task parameters as supplied by the dashboard definition
pub type Params = Map<String, Value>;

/// Idempotent, shareable cancellation flag for a task.
///
/// Clones observe the same flag. Once tripped it never resets.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the task. Returns `true` only for the call that flipped the flag.
    pub fn cancel(&self) -> bool {
        !self.cancelled.swap(true, Ordering::AcqRel)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// A configured instance of a check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Task identity, generated when the definition omits it
    #[serde(default = "new_task_id")]
    pub id: String,

    /// Display label
    pub label: String,

    /// Scheduling interval, opaque to this crate
    #[serde(default)]
    pub interval: String,

    /// Check type, the key into the task registry
    pub task: String,

    /// Free-form check parameters
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub params: Params,

    /// Run exactly one more time, then cancel
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub once: bool,

    #[serde(skip)]
    cancel: CancelHandle,
}

fn new_task_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl Task {
    /// Create a task for `check` with a generated id
    pub fn new(check: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: new_task_id(),
            label: label.into(),
            interval: String::new(),
            task: check.into(),
            params: Params::new(),
            once: false,
            cancel: CancelHandle::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_interval(mut self, interval: impl Into<String>) -> Self {
        self.interval = interval.into();
        self
    }

    /// Set a single parameter
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Mark the task as single-shot
    pub fn run_once(mut self) -> Self {
        self.once = true;
        self
    }

    /// The cancellation handle shared by every clone of this task
    pub fn cancel_handle(&self) -> &CancelHandle {
        &self.cancel
    }

    /// Cancel the task, see [`CancelHandle::cancel`]
    pub fn cancel(&self) -> bool {
        self.cancel.cancel()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
