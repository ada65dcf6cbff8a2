use async_trait::async_trait;
use serde::Serialize;

use super::require;
use crate::params::{Defaults, ResolvedParams};
use crate::registry::{TaskArgs, TaskHandler};
use crate::task::{TaskResult, Update};
use crate::template;

/// Fields available to media URL templates
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct MediaFields {
    pub cache_key: u64,
}

/// Embed `url` (templated with `{{ .CacheKey }}`) as `type` media.
///
/// A `once` task deactivates itself after the first embed.
pub struct MediaCheck;

#[async_trait]
impl TaskHandler for MediaCheck {
    async fn run(&self, args: &TaskArgs<'_>) -> TaskResult {
        let params = ResolvedParams::new(&args.task.params, Defaults::new().with("type", "iframe"));
        let url = require!(args.task, params.non_empty_string("url"));
        let kind = require!(args.task, params.string("type"));

        let fields = MediaFields { cache_key: rand::random() };
        let url = template::render(&url, &fields);

        if args.task.once {
            args.task.cancel();
        }
        TaskResult::new(args.task).with_update(Update::Media { url, kind })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{Environment, ResultSink};
    use crate::task::Task;

    async fn run(task: &Task) -> TaskResult {
        let env = Environment::builder().build().unwrap();
        let (sink, _rx) = ResultSink::channel();
        MediaCheck.run(&TaskArgs { task, env: &env, sink: &sink }).await
    }

    #[tokio::test]
    async fn test_cache_key_substitution() {
        let task = Task::new("media", "Camera").with_param("url", "https://cam.example.org/live.jpg?v={{ .CacheKey }}");
        let result = run(&task).await;

        let Some(Update::Media { url, kind }) = result.update else { panic!("expected media update") };
        assert_eq!(kind, "iframe");
        let key = url.strip_prefix("https://cam.example.org/live.jpg?v=").unwrap();
        assert!(key.parse::<u64>().is_ok());
        assert!(!task.is_cancelled());
    }

    #[tokio::test]
    async fn test_malformed_template_is_echoed() {
        let task = Task::new("iframe", "Broken")
            .with_param("url", "https://example.org/{{ .Nope }}")
            .with_param("type", "image");
        let result = run(&task).await;
        assert_eq!(
            result.update,
            Some(Update::Media { url: "https://example.org/{{ .Nope }}".into(), kind: "image".into() })
        );
    }

    #[tokio::test]
    async fn test_once_task_cancels_itself() {
        let task = Task::new("media", "Banner").with_param("url", "https://example.org/banner.png").run_once();
        let result = run(&task).await;
        assert!(task.is_cancelled());
        assert!(!result.is_error());
    }
}
