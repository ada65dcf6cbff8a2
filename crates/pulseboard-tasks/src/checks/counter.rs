//! Callback-driven counter checks.
//!
//! Registration subscribes the task to its token; every later increment of
//! that token produces a result through the [`ResultSink`].

use async_trait::async_trait;
use tracing::{debug, warn};

use super::require;
use crate::counter::StoreWriter;
use crate::environment::{DurableStore, ResultSink};
use crate::error::StoreError;
use crate::params::{Defaults, ResolvedParams};
use crate::registry::{TaskArgs, TaskHandler};
use crate::task::{Task, TaskResult, Update};

/// In-memory counter bound to `token`
pub struct CounterCheck;

#[async_trait]
impl TaskHandler for CounterCheck {
    async fn run(&self, args: &TaskArgs<'_>) -> TaskResult {
        let params = ResolvedParams::new(&args.task.params, Defaults::new());
        let token = require!(args.task, params.non_empty_string("token"));

        register(args, &token, None)
    }
}

/// Counter bound to `token`, seeded from and mirrored to the durable store
pub struct DurableCounterCheck;

#[async_trait]
impl TaskHandler for DurableCounterCheck {
    async fn run(&self, args: &TaskArgs<'_>) -> TaskResult {
        let params = ResolvedParams::new(&args.task.params, Defaults::new());
        let token = require!(args.task, params.non_empty_string("token"));

        let Some(durable) = args.env.durable() else {
            return TaskResult::failure(args.task, StoreError::Disabled);
        };
        if let Err(e) = durable.store.ping().await {
            warn!(token = %token, "Durable store unavailable: {}", e);
            return TaskResult::failure(args.task, e);
        }

        if let Some(count) = stored_count(durable, &token).await {
            args.env.counters().seed_if_fresh(&token, count);
        }
        register(args, &token, Some(durable.writer.clone()))
    }
}

/// Best-effort read of a previously mirrored count
async fn stored_count(durable: &DurableStore, token: &str) -> Option<i64> {
    match durable.store.get(token).await {
        Ok(Some(raw)) => match raw.trim().parse() {
            Ok(count) => Some(count),
            Err(_) => {
                debug!(token, raw = %raw, "Ignoring non-numeric stored count");
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            warn!(token, "Failed to read stored count: {}", e);
            None
        }
    }
}

/// Subscribe `args.task` to `token` and report the current count
fn register(args: &TaskArgs<'_>, token: &str, writer: Option<StoreWriter>) -> TaskResult {
    let hub = args.env.counters();
    let notify = Notifier {
        token: token.to_string(),
        task: args.task.clone(),
        sink: args.sink.clone(),
        writer,
    };
    let subscription = hub.subscribe(token, move |count| notify.changed(count));
    debug!(token, task = %args.task.id, ?subscription, "Counter task registered");

    let count = hub.get(token).unwrap_or_default();
    TaskResult::new(args.task).with_update(Update::Count { count })
}

struct Notifier {
    token: String,
    task: Task,
    sink: ResultSink,
    writer: Option<StoreWriter>,
}

impl Notifier {
    /// Runs under the counter lock, so it only enqueues. Returns `false`
    /// once the task is cancelled, which drops the subscription.
    fn changed(&self, count: i64) -> bool {
        if self.task.is_cancelled() {
            debug!(task = %self.task.id, token = %self.token, "Dropping cancelled counter subscriber");
            return false;
        }
        if let Some(writer) = &self.writer {
            writer.enqueue(&self.token, count);
        }
        let result = TaskResult::new(&self.task).with_update(Update::Count { count });
        if !self.sink.emit(result) {
            debug!(task = %self.task.id, "Result receiver closed, dropping counter update");
        }
        true
    }
}
