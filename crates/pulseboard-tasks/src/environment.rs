//! Shared dependencies handed to every check.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::DashConfig;
use crate::counter::{CounterHub, CounterStore, StoreWriter};
use crate::error::EnvironmentError;
use crate::task::TaskResult;
use crate::{PROJECT, VERSION};

/// Channel end through which callback-driven checks deliver results
#[derive(Debug, Clone)]
pub struct ResultSink {
    tx: mpsc::UnboundedSender<TaskResult>,
}

impl ResultSink {
    /// Create a sink and the receiver the delivery transport drains
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TaskResult>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Deliver a result; returns `false` once the receiver is gone
    pub fn emit(&self, result: TaskResult) -> bool {
        self.tx.send(result).is_ok()
    }
}

/// Durable mirror of the counter hub
#[derive(Clone)]
pub struct DurableStore {
    pub store: Arc<dyn CounterStore>,
    pub writer: StoreWriter,
}

/// Dependencies shared by all handlers, built once at startup
#[derive(Clone)]
pub struct Environment {
    http: reqwest::Client,
    user_agent: String,
    feed_timeout: Duration,
    counters: Arc<CounterHub>,
    durable: Option<DurableStore>,
}

impl Environment {
    pub fn builder() -> EnvironmentBuilder {
        EnvironmentBuilder::default()
    }

    /// Build the environment described by `config`.
    ///
    /// Opening the durable store does not require it to be reachable yet.
    pub async fn from_config(config: &DashConfig) -> Result<Self, EnvironmentError> {
        let mut builder = Self::builder()
            .user_agent(config.http.user_agent())
            .http_timeout(Duration::from_secs(config.http.timeout_secs))
            .accept_invalid_certs(config.http.accept_invalid_certs)
            .feed_timeout(Duration::from_secs(config.feed.timeout_secs));

        if config.store.enabled {
            builder = builder.store(open_store(&config.store.url)?);
        }

        builder.build()
    }

    /// Preconfigured HTTP client for outbound checks
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn feed_timeout(&self) -> Duration {
        self.feed_timeout
    }

    pub fn counters(&self) -> &Arc<CounterHub> {
        &self.counters
    }

    pub fn durable(&self) -> Option<&DurableStore> {
        self.durable.as_ref()
    }
}

#[cfg(feature = "redis")]
fn open_store(url: &str) -> Result<Arc<dyn CounterStore>, EnvironmentError> {
    Ok(Arc::new(crate::counter::RedisStore::open(url)?))
}

#[cfg(not(feature = "redis"))]
fn open_store(_url: &str) -> Result<Arc<dyn CounterStore>, EnvironmentError> {
    Err(crate::error::StoreError::Disabled.into())
}

/// Builder for [`Environment`]
pub struct EnvironmentBuilder {
    user_agent: String,
    http_timeout: Duration,
    accept_invalid_certs: bool,
    feed_timeout: Duration,
    counters: Option<Arc<CounterHub>>,
    store: Option<Arc<dyn CounterStore>>,
}

impl Default for EnvironmentBuilder {
    fn default() -> Self {
        Self {
            user_agent: format!("{}/{}", PROJECT, VERSION),
            http_timeout: Duration::from_secs(30),
            accept_invalid_certs: true,
            feed_timeout: Duration::from_secs(30),
            counters: None,
            store: None,
        }
    }
}

impl EnvironmentBuilder {
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    pub fn feed_timeout(mut self, timeout: Duration) -> Self {
        self.feed_timeout = timeout;
        self
    }

    /// Share an existing counter hub instead of creating one
    pub fn counters(mut self, counters: Arc<CounterHub>) -> Self {
        self.counters = Some(counters);
        self
    }

    /// Attach a durable counter store
    pub fn store(mut self, store: Arc<dyn CounterStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Build the environment. Spawns the store writer, so a store-backed
    /// build must run inside a tokio runtime.
    pub fn build(self) -> Result<Environment, EnvironmentError> {
        let http = reqwest::Client::builder()
            .user_agent(self.user_agent.clone())
            .timeout(self.http_timeout)
            .danger_accept_invalid_certs(self.accept_invalid_certs)
            .build()?;

        let durable = self.store.map(|store| {
            info!("Durable counter store attached");
            DurableStore { writer: StoreWriter::spawn(store.clone()), store }
        });
        debug!(user_agent = %self.user_agent, "Check environment ready");

        Ok(Environment {
            http,
            user_agent: self.user_agent,
            feed_timeout: self.feed_timeout,
            counters: self.counters.unwrap_or_default(),
            durable,
        })
    }
}
