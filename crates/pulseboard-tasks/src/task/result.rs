use std::fmt::Display;

use serde::{Serialize, Serializer};

use super::Task;

/// Delivery classification used unless a check overrides it
pub const DEFAULT_EVENT: &str = "update";

/// Sparkline value and warn flag for the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Spark {
    pub value: i64,
    pub warn: bool,
}

/// Ping statistics payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PingUpdate {
    pub sent: u32,
    pub recv: u32,
    /// Packet loss in percent
    pub loss: f64,
    /// Average round trip in milliseconds
    pub avg: i64,
    /// Round trip standard deviation in milliseconds
    pub jitt: i64,
}

/// One reduced feed entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedItem {
    pub title: String,
    pub description: String,
    pub link: String,
    pub published: String,
}

/// Feed payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedUpdate {
    pub title: String,
    pub description: String,
    pub items: Vec<FeedItem>,
}

/// Check-specific payload of a result.
///
/// The variant is fixed per check type so the UI can rely on a stable shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Update {
    /// Reachability checks
    Connected { connected: bool },
    /// Ping checks
    Ping(PingUpdate),
    /// DNS checks
    Valid { valid: bool },
    /// HTTP checks
    Content { content: String },
    /// Feed checks
    Feed(FeedUpdate),
    /// Media embeds
    Media {
        url: String,
        #[serde(rename = "type")]
        kind: String,
    },
    /// Atomic counters
    Count { count: i64 },
}

/// Outcome of one task execution
#[derive(Debug, Clone, PartialEq)]
pub struct TaskResult {
    /// Check type of the task
    pub task: String,
    pub label: String,
    /// Task id
    pub id: String,
    /// Creation time in epoch milliseconds
    pub date: i64,
    pub notification: Option<String>,
    pub location: Option<String>,
    pub spark: Option<Spark>,
    pub warn: bool,
    pub update: Option<Update>,
    pub error: Option<String>,
    pub event: String,
    /// Internal only, never serialized
    pub cancelled: bool,
}

impl TaskResult {
    /// Fresh result echoing the task identity
    pub fn new(task: &Task) -> Self {
        Self {
            task: task.task.clone(),
            label: task.label.clone(),
            id: task.id.clone(),
            date: chrono::Utc::now().timestamp_millis(),
            notification: None,
            location: None,
            spark: None,
            warn: false,
            update: None,
            error: None,
            event: DEFAULT_EVENT.to_string(),
            cancelled: false,
        }
    }

    /// Result carrying only an error
    pub fn failure(task: &Task, error: impl Display) -> Self {
        Self::new(task).with_error(error)
    }

    pub fn with_update(mut self, update: Update) -> Self {
        self.update = Some(update);
        self
    }

    pub fn with_spark(mut self, value: i64, warn: bool) -> Self {
        self.spark = Some(Spark { value, warn });
        self
    }

    pub fn with_notification(mut self, notification: impl Into<String>) -> Self {
        self.notification = Some(notification.into());
        self
    }

    /// Flag a warning with its notification text
    pub fn with_warning(mut self, notification: impl Into<String>) -> Self {
        self.warn = true;
        self.notification = Some(notification.into());
        self
    }

    pub fn with_error(mut self, error: impl Display) -> Self {
        self.error = Some(error.to_string());
        self
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Serialize)]
struct WireResult<'a> {
    task: &'a str,
    label: &'a str,
    id: &'a str,
    date: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    notification: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    spark: Option<&'a Spark>,
    warn: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    update: Option<&'a Update>,
    error: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    errormsg: Option<&'a str>,
    event: &'a str,
}

impl Serialize for TaskResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        WireResult {
            task: &self.task,
            label: &self.label,
            id: &self.id,
            date: self.date,
            notification: self.notification.as_deref(),
            location: self.location.as_deref(),
            spark: self.spark.as_ref(),
            warn: self.warn,
            update: self.update.as_ref(),
            error: self.error.as_deref(),
            errormsg: self.error.as_deref(),
            event: &self.event,
        }
        .serialize(serializer)
    }
}
