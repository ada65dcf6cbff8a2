use thiserror::Error;

/// Parameter resolution failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamError {
    #[error("missing required parameter: {0}")]
    Missing(String),

    #[error("parameter {key} is not a valid {expected}")]
    Invalid { key: String, expected: &'static str },
}

/// Durable counter store failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("durable store is not enabled")]
    Disabled,

    #[error("durable store is unavailable: {0}")]
    Unavailable(String),

    #[cfg(feature = "redis")]
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Registry dispatch failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("unknown check type: {0}")]
    UnknownCheck(String),

    #[error("task {0} has been cancelled")]
    Cancelled(String),
}

/// Failures while assembling the shared check environment
#[derive(Debug, Error)]
pub enum EnvironmentError {
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}
