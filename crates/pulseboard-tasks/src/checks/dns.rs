//! DNS-over-HTTPS record checks.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::{configuration_error, require};
use crate::cidr;
use crate::environment::Environment;
use crate::params::{Defaults, ResolvedParams};
use crate::registry::{TaskArgs, TaskHandler};
use crate::task::{TaskResult, Update};

pub const DEFAULT_PROVIDER: &str = "https://cloudflare-dns.com/dns-query";
pub const DEFAULT_TARGET: &str = "example.org";
pub const DEFAULT_RECORD: &str = "A";

/// JSON answer of a DoH resolver
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DnsResponse {
    pub status: i64,
    #[serde(default)]
    pub answer: Vec<DnsAnswer>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DnsAnswer {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: i64,
    #[serde(default)]
    pub data: String,
}

impl DnsResponse {
    /// Record data of every answer
    pub fn addresses(&self) -> Vec<&str> {
        self.answer.iter().map(|answer| answer.data.as_str()).collect()
    }
}

struct Query {
    provider: String,
    target: String,
    record: String,
}

impl Query {
    fn resolve(params: &ResolvedParams<'_>) -> Result<Self, crate::ParamError> {
        // `request` is the legacy spelling of `type`
        let record = if params.contains("type") || !params.contains("request") {
            params.non_empty_string("type")?
        } else {
            params.non_empty_string("request")?
        };
        Ok(Self {
            provider: params.non_empty_string("provider")?,
            target: params.non_empty_string("target")?,
            record,
        })
    }
}

fn defaults() -> Defaults {
    Defaults::new()
        .with("provider", DEFAULT_PROVIDER)
        .with("target", DEFAULT_TARGET)
        .with("type", DEFAULT_RECORD)
}

/// Ask `provider` for the `record` records of `target`
pub async fn lookup(env: &Environment, provider: &str, target: &str, record: &str) -> Result<DnsResponse> {
    let url = Url::parse_with_params(provider, &[("name", target), ("type", record)])
        .map_err(|e| anyhow!("invalid DNS provider {}: {}", provider, e))?;
    debug!(%url, "Querying DNS provider");

    let response = env
        .http()
        .get(url)
        .header(ACCEPT, "application/dns-json")
        .send()
        .await
        .map_err(|e| anyhow!("DNS request failed: {}", e))?;

    response.json::<DnsResponse>().await.map_err(|e| anyhow!("invalid DNS response: {}", e))
}

fn invalid_record(record: &str, status: i64) -> String {
    format!("invalid {} record has been detected! Status code: {}", record, status)
}

/// Warn unless the resolver answered with status 0
pub struct DnsCheck;

#[async_trait]
impl TaskHandler for DnsCheck {
    async fn run(&self, args: &TaskArgs<'_>) -> TaskResult {
        let params = ResolvedParams::new(&args.task.params, defaults());
        let query = require!(args.task, Query::resolve(&params));

        match lookup(args.env, &query.provider, &query.target, &query.record).await {
            Ok(response) => {
                let valid = response.status == 0;
                let mut result = TaskResult::new(args.task);
                if !valid {
                    result = result.with_warning(invalid_record(&query.record, response.status));
                }
                result.with_update(Update::Valid { valid })
            }
            Err(e) => TaskResult::failure(args.task, &e)
                .with_notification(format!("a DNS error has occurred: {:?}", e.to_string())),
        }
    }
}

/// Like [`DnsCheck`], and at least one answer must lie inside `ranges`
pub struct DnsCidrCheck;

#[async_trait]
impl TaskHandler for DnsCidrCheck {
    async fn run(&self, args: &TaskArgs<'_>) -> TaskResult {
        let params = ResolvedParams::new(&args.task.params, defaults());
        let query = require!(args.task, Query::resolve(&params));
        let ranges = require!(args.task, params.strings("ranges"));
        if ranges.is_empty() {
            return configuration_error(args.task, "missing ranges");
        }

        match lookup(args.env, &query.provider, &query.target, &query.record).await {
            Ok(response) => {
                let mut result = TaskResult::new(args.task);
                let valid = cidr::any_contains(&ranges, &response.addresses());
                if !valid {
                    result = result.with_warning(format!(
                        "{} record is not within the valid CIDR ranges!",
                        query.record
                    ));
                }
                result.with_update(Update::Valid { valid })
            }
            Err(e) => TaskResult::failure(args.task, &e)
                .with_notification(format!("a DNS-CIDR error has occurred: {:?}", e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::task::{Params, Task};

    fn params(value: serde_json::Value) -> Params {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_query_defaults_and_alias() {
        let empty = Params::new();
        let query = Query::resolve(&ResolvedParams::new(&empty, defaults())).unwrap();
        assert_eq!(query.provider, DEFAULT_PROVIDER);
        assert_eq!(query.target, DEFAULT_TARGET);
        assert_eq!(query.record, "A");

        let legacy = params(json!({"request": "AAAA"}));
        let query = Query::resolve(&ResolvedParams::new(&legacy, defaults())).unwrap();
        assert_eq!(query.record, "AAAA");

        let both = params(json!({"request": "AAAA", "type": "TXT"}));
        let query = Query::resolve(&ResolvedParams::new(&both, defaults())).unwrap();
        assert_eq!(query.record, "TXT");
    }

    #[test]
    fn test_response_decoding() {
        let body = r#"{"Status":0,"TC":false,"Answer":[{"name":"example.org","type":1,"TTL":300,"data":"93.184.215.14"}]}"#;
        let response: DnsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.status, 0);
        assert_eq!(response.addresses(), vec!["93.184.215.14"]);

        let nx: DnsResponse = serde_json::from_str(r#"{"Status":3}"#).unwrap();
        assert_eq!(nx.status, 3);
        assert!(nx.answer.is_empty());
    }

    #[tokio::test]
    async fn test_missing_ranges_cancels_task() {
        let env = Environment::builder().build().unwrap();
        let (sink, _rx) = crate::ResultSink::channel();
        let task = Task::new("dns-cidr", "Edge").with_param("ranges", json!([]));

        let result = DnsCidrCheck.run(&TaskArgs { task: &task, env: &env, sink: &sink }).await;
        assert!(result.is_error());
        assert!(result.cancelled);
        assert!(task.is_cancelled());
    }
}
