//! Check handlers, one per check type.
//!
//! Every handler resolves its parameters against declared defaults, performs
//! a single bounded I/O operation and normalizes the outcome into a
//! [`TaskResult`]. Warnings mean the check produced data worth flagging;
//! errors mean it produced none.

use std::fmt::Display;

use tracing::warn;

use crate::task::{Task, TaskResult};

pub mod counter;
pub mod dns;
pub mod fake;
pub mod feed;
pub mod http;
pub mod media;
pub mod ping;
pub mod port;

/// Unwrap a required parameter or bail out with a configuration error
macro_rules! require {
    ($task:expr, $value:expr) => {
        match $value {
            Ok(value) => value,
            Err(error) => return $crate::checks::configuration_error($task, error),
        }
    };
}
pub(crate) use require;

/// Cancel `task` for good and report why.
///
/// Used when a required parameter is missing or invalid; retrying such a
/// task can never succeed.
pub fn configuration_error(task: &Task, error: impl Display) -> TaskResult {
    task.cancel();
    warn!(task = %task.task, id = %task.id, "Cancelling task after configuration error: {}", error);
    let mut result = TaskResult::failure(task, error);
    result.cancelled = true;
    result
}

/// 2xx status codes
pub(crate) fn is_success_status(status: u16) -> bool {
    (200..=299).contains(&status)
}
