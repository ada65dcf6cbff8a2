//! Demo checks producing plausible random data for dashboards without real
//! targets.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use rand::Rng;
use serde::Serialize;

use super::feed::{self, DEFAULT_LIMIT};
use super::ping::ping_result;
use super::port::unreachable_notice;
use super::{configuration_error, require};
use crate::params::{Defaults, ResolvedParams};
use crate::registry::{TaskArgs, TaskHandler};
use crate::task::{PingUpdate, TaskResult, Update};
use crate::template;

/// Randomly connected or not
pub struct FakePortCheck;

#[async_trait]
impl TaskHandler for FakePortCheck {
    async fn run(&self, args: &TaskArgs<'_>) -> TaskResult {
        let connected = rand::thread_rng().gen_bool(0.5);
        let mut result = TaskResult::new(args.task).with_update(Update::Connected { connected });
        if !connected {
            result = result.with_warning(unreachable_notice("FAKE", 10));
        }
        result
    }
}

/// Random ping statistics within `range` ms
pub struct FakePingCheck;

#[async_trait]
impl TaskHandler for FakePingCheck {
    async fn run(&self, args: &TaskArgs<'_>) -> TaskResult {
        let params = ResolvedParams::new(
            &args.task.params,
            Defaults::new().with("high", 75).with("range", vec![1, 100]),
        );
        let high = require!(args.task, params.int("high"));
        let range = require!(args.task, params.ints("range"));
        let &[low, top] = range.as_slice() else {
            return configuration_error(args.task, "range must hold exactly two bounds");
        };
        if low < 0 || low >= top {
            return configuration_error(args.task, "range must be an increasing pair of non-negative numbers");
        }

        ping_result(args.task, fake_ping(low, top, high), high)
    }
}

fn fake_ping(low: i64, top: i64, high: i64) -> PingUpdate {
    let mut rng = rand::thread_rng();
    let sent = top.min(i64::from(u32::MAX)) as u32;
    let recv = if rng.gen_range(0..100) >= high { rng.gen_range(low..top) as u32 } else { sent };
    PingUpdate {
        sent,
        recv,
        loss: f64::from(sent - recv) * 100.0 / f64::from(sent),
        avg: rng.gen_range(low..top),
        jitt: rng.gen_range(0..50),
    }
}

const FAKE_FEED_HEAD: &str = r#"<?xml version="1.0" encoding="UTF-8" ?>
<rss version="2.0">
<channel>
    <title>Demo RSS Feed</title>
    <link>https://example.org</link>
    <description>Example RSS feed!</description>
"#;

const FAKE_FEED_ITEM: &str = r#"<item>
    <title>This is example #{{ .ID }} for "FakeFeed" generator.</title>
    <link>https://example.org/item-{{ .ID }}</link>
    <description>Example RSS item #{{ .ID }}</description>
    <pubDate>{{ .Date }}</pubDate>
</item>
"#;

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct FakeItem {
    #[serde(rename = "ID")]
    id: usize,
    date: String,
}

/// Synthetic RSS feed of `limit` items
pub struct FakeFeedCheck;

#[async_trait]
impl TaskHandler for FakeFeedCheck {
    async fn run(&self, args: &TaskArgs<'_>) -> TaskResult {
        let params = ResolvedParams::new(&args.task.params, Defaults::new().with("limit", DEFAULT_LIMIT));
        let limit = require!(args.task, params.int("limit")).clamp(1, 100) as usize;

        match feed::parse(fake_feed(limit).as_bytes()) {
            Ok(parsed) => TaskResult::new(args.task).with_update(Update::Feed(feed::reduce(parsed, limit))),
            Err(e) => TaskResult::failure(args.task, e),
        }
    }
}

/// RSS document with `limit` items dated randomly between 1970 and now
pub fn fake_feed(limit: usize) -> String {
    let mut rng = rand::thread_rng();
    let now = Utc::now().timestamp();

    let mut document = String::from(FAKE_FEED_HEAD);
    for id in 1..=limit {
        let date = Utc
            .timestamp_opt(rng.gen_range(0..now.max(1)), 0)
            .single()
            .map(|date| date.to_rfc2822())
            .unwrap_or_default();
        document.push_str(&template::render(FAKE_FEED_ITEM, &FakeItem { id, date }));
    }
    document.push_str("</channel>\n</rss>\n");
    document
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::environment::{Environment, ResultSink};
    use crate::task::Task;

    async fn run(handler: &dyn TaskHandler, task: &Task) -> TaskResult {
        let env = Environment::builder().build().unwrap();
        let (sink, _rx) = ResultSink::channel();
        handler.run(&TaskArgs { task, env: &env, sink: &sink }).await
    }

    #[tokio::test]
    async fn test_fake_port_shape() {
        let result = run(&FakePortCheck, &Task::new("fakeport", "Demo")).await;
        let Some(Update::Connected { connected }) = result.update else { panic!("expected connected update") };
        assert_eq!(result.warn, !connected);
        assert!(!result.is_error());
    }

    #[tokio::test]
    async fn test_fake_ping_within_range() {
        let task = Task::new("fakeping", "Demo").with_param("range", json!([10, 20]));
        for _ in 0..20 {
            let result = run(&FakePingCheck, &task).await;
            let Some(Update::Ping(update)) = result.update else { panic!("expected ping update") };
            assert!((10..20).contains(&update.avg));
            assert!(update.recv <= update.sent);
            assert_eq!(result.spark.map(|s| s.value), Some(update.avg));
        }
    }

    #[tokio::test]
    async fn test_fake_ping_rejects_bad_range() {
        let task = Task::new("fakeping", "Demo").with_param("range", json!([5]));
        let result = run(&FakePingCheck, &task).await;
        assert!(result.is_error());
        assert!(task.is_cancelled());
    }

    #[tokio::test]
    async fn test_fake_feed_items() {
        let task = Task::new("fakefeed", "Demo").with_param("limit", 3);
        let result = run(&FakeFeedCheck, &task).await;

        let Some(Update::Feed(update)) = result.update else { panic!("expected feed update") };
        assert_eq!(update.title, "Demo RSS Feed");
        assert_eq!(update.description, "Example RSS feed!");
        assert_eq!(update.items.len(), 3);
        assert_eq!(update.items[1].title, r#"This is example #2 for "FakeFeed" generator."#);
        assert_eq!(update.items[2].link, "https://example.org/item-3");
        assert_eq!(update.items[0].description, "Example RSS item #1");
    }

    #[tokio::test]
    async fn test_fake_feed_limit_is_clamped() {
        let task = Task::new("fakefeed", "Demo").with_param("limit", 100_000_000);
        let result = run(&FakeFeedCheck, &task).await;
        let Some(Update::Feed(update)) = result.update else { panic!("expected feed update") };
        assert_eq!(update.items.len(), 100);

        let task = Task::new("fakefeed", "Demo").with_param("limit", -4);
        let result = run(&FakeFeedCheck, &task).await;
        let Some(Update::Feed(update)) = result.update else { panic!("expected feed update") };
        assert_eq!(update.items.len(), 1);
    }
}
