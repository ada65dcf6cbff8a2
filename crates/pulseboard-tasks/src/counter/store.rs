//! Durable stores that mirror counter values.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::StoreError;

/// Key-value store holding the latest count per token
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Probe the store, failing when it is unreachable
    async fn ping(&self) -> Result<(), StoreError>;

    /// Raw stored value for `token`, `None` when absent
    async fn get(&self, token: &str) -> Result<Option<String>, StoreError>;

    /// Persist `count` for `token` with no expiry
    async fn set(&self, token: &str, count: i64) -> Result<(), StoreError>;
}

/// In-process store, useful for tests and single-node dashboards
#[derive(Debug)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
    available: AtomicBool,
    writable: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            values: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
            writable: AtomicBool::new(true),
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preload a raw value for `token`
    pub fn with_value(self, token: &str, value: impl Into<String>) -> Self {
        self.values.lock().insert(token.to_string(), value.into());
        self
    }

    /// Toggle whether `ping` succeeds
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    /// Toggle whether `set` succeeds
    pub fn set_writable(&self, writable: bool) {
        self.writable.store(writable, Ordering::Release);
    }

    pub fn value(&self, token: &str) -> Option<String> {
        self.values.lock().get(token).cloned()
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store is offline".to_string()))
        }
    }

    async fn get(&self, token: &str) -> Result<Option<String>, StoreError> {
        Ok(self.value(token))
    }

    async fn set(&self, token: &str, count: i64) -> Result<(), StoreError> {
        if !self.writable.load(Ordering::Acquire) {
            return Err(StoreError::Unavailable("memory store is read-only".to_string()));
        }
        self.values.lock().insert(token.to_string(), count.to_string());
        Ok(())
    }
}

#[cfg(feature = "redis")]
pub use self::redis_store::RedisStore;

#[cfg(feature = "redis")]
mod redis_store {
    use async_trait::async_trait;
    use redis::{AsyncCommands, Client, aio::MultiplexedConnection};
    use tokio::sync::OnceCell;
    use tracing::{debug, info};

    use super::CounterStore;
    use crate::error::StoreError;

    /// Redis-backed counter store.
    ///
    /// The connection is established on first use and retried on later
    /// calls while the server is unreachable.
    pub struct RedisStore {
        client: Client,
        connection: OnceCell<MultiplexedConnection>,
    }

    impl RedisStore {
        /// Validate `url` without connecting
        pub fn open(url: &str) -> Result<Self, StoreError> {
            info!(url = %sanitize_url(url), "Opening redis counter store");
            Ok(Self { client: Client::open(url)?, connection: OnceCell::new() })
        }

        async fn connection(&self) -> Result<MultiplexedConnection, StoreError> {
            let connection = self
                .connection
                .get_or_try_init(|| self.client.get_multiplexed_async_connection())
                .await?;
            Ok(connection.clone())
        }
    }

    #[async_trait]
    impl CounterStore for RedisStore {
        async fn ping(&self) -> Result<(), StoreError> {
            let mut conn = self.connection().await?;
            let _: String = redis::cmd("PING").query_async(&mut conn).await?;
            debug!("Redis counter store ping succeeded");
            Ok(())
        }

        async fn get(&self, token: &str) -> Result<Option<String>, StoreError> {
            let mut conn = self.connection().await?;
            let value: Option<String> = conn.get(token).await?;
            Ok(value)
        }

        async fn set(&self, token: &str, count: i64) -> Result<(), StoreError> {
            let mut conn = self.connection().await?;
            let _: () = conn.set(token, count).await?;
            Ok(())
        }
    }

    /// Hide any password before logging a redis URL
    fn sanitize_url(url: &str) -> String {
        match url::Url::parse(url) {
            Ok(mut parsed) => {
                if parsed.password().is_some() {
                    let _ = parsed.set_password(Some("***"));
                }
                parsed.to_string()
            }
            Err(_) => "invalid_url".to_string(),
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_sanitize_url() {
            assert_eq!(sanitize_url("redis://:secret@cache:6379/0"), "redis://:***@cache:6379/0");
            assert_eq!(sanitize_url("redis://cache:6379"), "redis://cache:6379");
            assert_eq!(sanitize_url("::"), "invalid_url");
        }
    }
}
