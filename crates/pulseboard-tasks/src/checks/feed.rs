//! RSS/Atom feed ingestion.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use feed_rs::model::{Entry, Feed, Text};
use tokio::time::timeout;
use tracing::debug;

use super::require;
use crate::environment::Environment;
use crate::params::{Defaults, ResolvedParams};
use crate::registry::{TaskArgs, TaskHandler};
use crate::task::{FeedItem, FeedUpdate, TaskResult, Update};

pub const DEFAULT_LIMIT: i64 = 5;

/// Fetch `url` and emit at most `limit` entries
pub struct FeedCheck;

#[async_trait]
impl TaskHandler for FeedCheck {
    async fn run(&self, args: &TaskArgs<'_>) -> TaskResult {
        let params = ResolvedParams::new(&args.task.params, Defaults::new().with("limit", DEFAULT_LIMIT));
        let url = require!(args.task, params.non_empty_string("url"));
        let limit = require!(args.task, params.int("limit")).max(0) as usize;

        let limit_time = args.env.feed_timeout();
        match timeout(limit_time, fetch_feed(args.env, &url)).await {
            Ok(Ok(feed)) => TaskResult::new(args.task).with_update(Update::Feed(reduce(feed, limit))),
            Ok(Err(e)) => TaskResult::failure(args.task, e),
            Err(_) => TaskResult::failure(args.task, format!("feed fetch timed out after {:?}", limit_time)),
        }
    }
}

async fn fetch_feed(env: &Environment, url: &str) -> Result<Feed> {
    debug!(url, "Fetching feed");
    let body = env
        .http()
        .get(url)
        .send()
        .await
        .map_err(|e| anyhow!("feed request failed: {}", e))?
        .bytes()
        .await
        .map_err(|e| anyhow!("failed to read feed body: {}", e))?;

    parse(&body)
}

/// Parse an RSS, Atom or JSON feed document
pub fn parse(document: &[u8]) -> Result<Feed> {
    feed_rs::parser::parse(document).map_err(|e| anyhow!("failed to parse feed: {}", e))
}

/// Reduce `feed` to its first `limit` entries, in document order
pub fn reduce(feed: Feed, limit: usize) -> FeedUpdate {
    FeedUpdate {
        title: text(feed.title.as_ref()),
        description: text(feed.description.as_ref()),
        items: feed.entries.iter().take(limit).map(item).collect(),
    }
}

fn item(entry: &Entry) -> FeedItem {
    FeedItem {
        title: text(entry.title.as_ref()),
        description: text(entry.summary.as_ref()),
        link: entry.links.first().map(|link| link.href.clone()).unwrap_or_default(),
        published: entry
            .published
            .or(entry.updated)
            .map(|date| date.to_rfc2822())
            .unwrap_or_default(),
    }
}

fn text(value: Option<&Text>) -> String {
    value.map(|t| t.content.trim().to_string()).unwrap_or_default()
}
