//! HTTP checks: raw fetch, status code, JSON query and regex extraction.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Method;
use tracing::debug;

use super::{configuration_error, is_success_status, require};
use crate::environment::Environment;
use crate::params::{Defaults, ResolvedParams};
use crate::query::query_text;
use crate::registry::{TaskArgs, TaskHandler};
use crate::task::{Task, TaskResult, Update};

/// Status and body of a completed request
#[derive(Debug, Clone)]
pub struct Fetched {
    pub status: u16,
    pub body: String,
}

/// Issue `method` against `url` with the shared client
pub async fn fetch(env: &Environment, method: Method, url: &str) -> Result<Fetched> {
    debug!(%method, url, "Fetching");
    let response = env
        .http()
        .request(method, url)
        .send()
        .await
        .map_err(|e| anyhow!("HTTP request failed: {}", e))?;

    let status = response.status().as_u16();
    let body = response.text().await.map_err(|e| anyhow!("failed to read response body: {}", e))?;
    Ok(Fetched { status, body })
}

fn invalid_status(status: u16) -> String {
    format!("an invalid status code has been found: {}", status)
}

/// Content result that warns on an empty value or a non-2xx status
fn content_result(task: &Task, status: u16, content: String, empty_notice: &str) -> TaskResult {
    let mut result = TaskResult::new(task);
    if content.is_empty() {
        result = result.with_warning(empty_notice);
    } else if !is_success_status(status) {
        result = result.with_warning(invalid_status(status));
    }
    result.with_update(Update::Content { content })
}

/// GET `url` and pass the body through
pub struct HttpCheck;

#[async_trait]
impl TaskHandler for HttpCheck {
    async fn run(&self, args: &TaskArgs<'_>) -> TaskResult {
        let params = ResolvedParams::new(&args.task.params, Defaults::new());
        let url = require!(args.task, params.non_empty_string("url"));

        match fetch(args.env, Method::GET, &url).await {
            Ok(fetched) => content_result(args.task, fetched.status, fetched.body, "no content returned!"),
            Err(e) => TaskResult::failure(args.task, e),
        }
    }
}

/// HEAD `url` and compare the status with `codes`.
///
/// One code requires equality, two codes form an inclusive range.
pub struct HttpStatusCheck;

#[async_trait]
impl TaskHandler for HttpStatusCheck {
    async fn run(&self, args: &TaskArgs<'_>) -> TaskResult {
        let params = ResolvedParams::new(&args.task.params, Defaults::new());
        let url = require!(args.task, params.non_empty_string("url"));
        let codes = require!(args.task, params.ints("codes"));
        if !matches!(codes.len(), 1 | 2) {
            return configuration_error(args.task, "codes must hold one status code or a two-element range");
        }

        match fetch(args.env, Method::HEAD, &url).await {
            Ok(fetched) => {
                let mut result = TaskResult::new(args.task);
                if !status_matches(&codes, fetched.status) {
                    result = result.with_warning(invalid_status(fetched.status));
                }
                result.with_update(Update::Content { content: fetched.status.to_string() })
            }
            Err(e) => TaskResult::failure(args.task, e),
        }
    }
}

/// Exact match for one code, inclusive range for two
pub fn status_matches(codes: &[i64], status: u16) -> bool {
    let status = i64::from(status);
    match codes {
        [code] => status == *code,
        [low, high] => (*low..=*high).contains(&status),
        _ => false,
    }
}

/// GET `url` and extract `query` from the JSON body
pub struct HttpJsonCheck;

#[async_trait]
impl TaskHandler for HttpJsonCheck {
    async fn run(&self, args: &TaskArgs<'_>) -> TaskResult {
        let params = ResolvedParams::new(&args.task.params, Defaults::new());
        let url = require!(args.task, params.non_empty_string("url"));
        let query = require!(args.task, params.non_empty_string("query"));

        match fetch(args.env, Method::GET, &url).await {
            Ok(fetched) => {
                let value = query_text(&fetched.body, &query);
                content_result(args.task, fetched.status, value, "no value returned in JSON query!")
            }
            Err(e) => TaskResult::failure(args.task, e),
        }
    }
}

/// GET `url` and extract the first capture of `regex`; no match is an error
pub struct HttpRegexCheck;

#[async_trait]
impl TaskHandler for HttpRegexCheck {
    async fn run(&self, args: &TaskArgs<'_>) -> TaskResult {
        let params = ResolvedParams::new(&args.task.params, Defaults::new());
        let url = require!(args.task, params.non_empty_string("url"));
        let pattern = require!(args.task, params.non_empty_string("regex"));
        let matcher = require!(args.task, Regex::new(&pattern));

        match fetch(args.env, Method::GET, &url).await {
            Ok(fetched) => match extract(&matcher, &fetched.body) {
                Some(value) => {
                    content_result(args.task, fetched.status, value, "no value returned in HTML query!")
                }
                None => TaskResult::failure(args.task, "no match"),
            },
            Err(e) => TaskResult::failure(args.task, e),
        }
    }
}

/// First capture group when the pattern has one, otherwise the whole match
pub fn extract(matcher: &Regex, haystack: &str) -> Option<String> {
    let captures = matcher.captures(haystack)?;
    let group = if matcher.captures_len() > 1 { captures.get(1) } else { captures.get(0) };
    Some(group.map(|m| m.as_str().to_string()).unwrap_or_default())
}
