use pulseboard_tasks::{Environment, ResultSink, Task, TaskRegistry, TaskResult, Update};
use serde_json::json;
use tokio::net::TcpListener;

async fn run(task: &Task) -> TaskResult {
    let env = Environment::builder().build().unwrap();
    let (sink, _rx) = ResultSink::channel();
    TaskRegistry::standard().run(task, &env, &sink).await.unwrap()
}

/// Address of a port that was just released, so nothing listens on it
async fn closed_port() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr.to_string()
}

#[tokio::test]
async fn test_open_port_connects() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let target = listener.local_addr().unwrap().to_string();

    let result = run(&Task::new("port", "Local").with_param("target", target)).await;

    assert_eq!(result.update, Some(Update::Connected { connected: true }));
    assert!(!result.warn);
    assert!(!result.is_error());
}

#[tokio::test]
async fn test_closed_port_warns_with_error() {
    let task = Task::new("port", "Local")
        .with_param("target", closed_port().await)
        .with_param("method", "tcp4")
        .with_param("timeout", 2);

    let result = run(&task).await;

    assert_eq!(result.update, Some(Update::Connected { connected: false }));
    assert!(result.warn);
    assert!(result.is_error());
    assert_eq!(
        result.notification.as_deref(),
        Some("Port checker could not connect to tcp4 target within 2 seconds!")
    );
}

#[tokio::test]
async fn test_numeric_strings_are_coerced() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let task = Task::new("port", "Local")
        .with_param("target", listener.local_addr().unwrap().to_string())
        .with_param("timeout", json!("5"));

    let result = run(&task).await;
    assert_eq!(result.update, Some(Update::Connected { connected: true }));
}

#[tokio::test]
async fn test_missing_target_cancels() {
    let task = Task::new("port", "Nowhere").with_param("timeout", 1);

    let result = run(&task).await;
    assert!(result.is_error());
    assert!(task.is_cancelled());
    assert!(result.update.is_none());
}
