//! Check registry and dispatch.
//!
//! The registry is an immutable table `check id -> {handler, category,
//! trigger mode}` built once during startup and shared by reference.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::checks::{
    counter::{CounterCheck, DurableCounterCheck},
    dns::{DnsCheck, DnsCidrCheck},
    fake::{FakeFeedCheck, FakePingCheck, FakePortCheck},
    feed::FeedCheck,
    http::{HttpCheck, HttpJsonCheck, HttpRegexCheck, HttpStatusCheck},
    media::MediaCheck,
    ping::PingCheck,
    port::PortCheck,
};
use crate::environment::{Environment, ResultSink};
use crate::error::DispatchError;
use crate::task::{Task, TaskResult};

/// UI section a check is grouped under
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Port,
    Ping,
    Http,
    Media,
    Feed,
    Dns,
    Counter,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Port => write!(f, "port"),
            Category::Ping => write!(f, "ping"),
            Category::Http => write!(f, "http"),
            Category::Media => write!(f, "media"),
            Category::Feed => write!(f, "feed"),
            Category::Dns => write!(f, "dns"),
            Category::Counter => write!(f, "counter"),
        }
    }
}

/// How the scheduler drives a check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerMode {
    /// Polled on the task interval
    Timer,
    /// Registered once, then driven by external events
    Timerless,
}

/// Everything a handler receives for one invocation
#[derive(Clone, Copy)]
pub struct TaskArgs<'a> {
    pub task: &'a Task,
    pub env: &'a Environment,
    /// Where callback-driven checks deliver later results
    pub sink: &'a ResultSink,
}

/// A check implementation
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Execute the check once and describe the outcome
    async fn run(&self, args: &TaskArgs<'_>) -> TaskResult;
}

/// Registry entry binding a handler to its UI category
#[derive(Clone)]
pub struct TaskRunner {
    pub handler: Arc<dyn TaskHandler>,
    pub category: Category,
    pub trigger: TriggerMode,
}

impl fmt::Debug for TaskRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRunner")
            .field("category", &self.category)
            .field("trigger", &self.trigger)
            .finish_non_exhaustive()
    }
}

/// Immutable check registry
#[derive(Debug, Clone)]
pub struct TaskRegistry {
    runners: HashMap<String, TaskRunner>,
}

impl TaskRegistry {
    pub fn builder() -> TaskRegistryBuilder {
        TaskRegistryBuilder::default()
    }

    /// Registry with every built-in check and its aliases
    pub fn standard() -> Self {
        use Category::*;

        Self::builder()
            .timer("port", Port, PortCheck)
            .timer("fakeport", Port, FakePortCheck)
            .timer("ping", Ping, PingCheck)
            .timer("fakeping", Ping, FakePingCheck)
            .timer("http", Http, HttpCheck)
            .timer("http-json", Http, HttpJsonCheck)
            .timer("http-status", Http, HttpStatusCheck)
            .timer("http-regex", Http, HttpRegexCheck)
            .timer("http-regexp", Http, HttpRegexCheck)
            .timer("media", Media, MediaCheck)
            .timer("iframe", Media, MediaCheck)
            .timer("feed", Feed, FeedCheck)
            .timer("fakefeed", Feed, FakeFeedCheck)
            .timer("dns", Dns, DnsCheck)
            .timer("dns-cidr", Dns, DnsCidrCheck)
            .timerless("counter", Counter, CounterCheck)
            .timerless("redis-counter", Counter, DurableCounterCheck)
            .build()
    }

    pub fn get(&self, check: &str) -> Option<&TaskRunner> {
        self.runners.get(check)
    }

    pub fn contains(&self, check: &str) -> bool {
        self.runners.contains_key(check)
    }

    /// Whether `check` is callback-driven rather than polled
    pub fn is_timerless(&self, check: &str) -> bool {
        self.get(check).is_some_and(|runner| runner.trigger == TriggerMode::Timerless)
    }

    /// Check ids grouped by category, for UI grouping only
    pub fn categories(&self) -> BTreeMap<Category, Vec<String>> {
        let mut mapping: BTreeMap<Category, Vec<String>> = BTreeMap::new();
        for (id, runner) in &self.runners {
            mapping.entry(runner.category).or_default().push(id.clone());
        }
        for ids in mapping.values_mut() {
            ids.sort();
        }
        mapping
    }

    /// Execute `task` with its registered handler.
    ///
    /// Cancelled tasks and unknown check ids are refused. A `once` timer task
    /// is cancelled after this execution.
    pub async fn run(
        &self,
        task: &Task,
        env: &Environment,
        sink: &ResultSink,
    ) -> Result<TaskResult, DispatchError> {
        if task.is_cancelled() {
            return Err(DispatchError::Cancelled(task.id.clone()));
        }

        let Some(runner) = self.get(&task.task) else {
            warn!(task = %task.task, id = %task.id, "No handler registered for check");
            return Err(DispatchError::UnknownCheck(task.task.clone()));
        };

        debug!(task = %task.task, id = %task.id, label = %task.label, "Running check");
        let args = TaskArgs { task, env, sink };
        let mut result = runner.handler.run(&args).await;

        if task.once && runner.trigger == TriggerMode::Timer {
            task.cancel();
        }
        result.cancelled = task.is_cancelled();
        Ok(result)
    }
}

/// Builder for [`TaskRegistry`]
#[derive(Default)]
pub struct TaskRegistryBuilder {
    runners: HashMap<String, TaskRunner>,
}

impl TaskRegistryBuilder {
    /// Register a polled check
    pub fn timer(self, id: &str, category: Category, handler: impl TaskHandler + 'static) -> Self {
        self.register(id, category, TriggerMode::Timer, Arc::new(handler))
    }

    /// Register a callback-driven check
    pub fn timerless(self, id: &str, category: Category, handler: impl TaskHandler + 'static) -> Self {
        self.register(id, category, TriggerMode::Timerless, Arc::new(handler))
    }

    pub fn register(
        mut self,
        id: &str,
        category: Category,
        trigger: TriggerMode,
        handler: Arc<dyn TaskHandler>,
    ) -> Self {
        self.runners.insert(id.to_string(), TaskRunner { handler, category, trigger });
        self
    }

    pub fn build(self) -> TaskRegistry {
        TaskRegistry { runners: self.runners }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_registry_contents() {
        let registry = TaskRegistry::standard();

        for id in ["port", "ping", "http-regexp", "iframe", "dns-cidr", "fakefeed", "redis-counter"] {
            assert!(registry.contains(id), "missing {id}");
        }
        assert!(registry.is_timerless("counter"));
        assert!(registry.is_timerless("redis-counter"));
        assert!(!registry.is_timerless("http"));
        assert!(!registry.is_timerless("unknown"));
    }

    #[test]
    fn test_category_index() {
        let categories = TaskRegistry::standard().categories();

        assert_eq!(
            categories[&Category::Http],
            vec!["http", "http-json", "http-regex", "http-regexp", "http-status"]
        );
        assert_eq!(categories[&Category::Counter], vec!["counter", "redis-counter"]);
        assert_eq!(categories[&Category::Media], vec!["iframe", "media"]);
        assert_eq!(categories.values().map(Vec::len).sum::<usize>(), 17);
    }

    #[test]
    fn test_category_serialization() {
        assert_eq!(serde_json::to_string(&Category::Dns).unwrap(), "\"dns\"");
        assert_eq!(Category::Counter.to_string(), "counter");
    }
}
