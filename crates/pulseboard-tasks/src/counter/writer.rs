use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::store::CounterStore;

enum WriteOp {
    Set { token: String, count: i64 },
    Flush(oneshot::Sender<()>),
}

/// One-way write queue in front of a [`CounterStore`].
///
/// Enqueueing never blocks; a background task applies writes in FIFO order,
/// so the latest count of a token is always the last one written. Failures
/// are logged and dropped.
#[derive(Debug, Clone)]
pub struct StoreWriter {
    tx: mpsc::UnboundedSender<WriteOp>,
}

impl StoreWriter {
    /// Start the background writer. Must be called inside a tokio runtime.
    pub fn spawn(store: Arc<dyn CounterStore>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(op) = rx.recv().await {
                match op {
                    WriteOp::Set { token, count } => {
                        if let Err(e) = store.set(&token, count).await {
                            warn!(token = %token, count, "Failed to mirror counter to store: {}", e);
                        }
                    }
                    WriteOp::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
            debug!("Counter store writer stopped");
        });

        Self { tx }
    }

    /// Queue a write of `count` for `token`
    pub fn enqueue(&self, token: &str, count: i64) {
        let op = WriteOp::Set { token: token.to_string(), count };
        if self.tx.send(op).is_err() {
            warn!(token, count, "Counter store writer is gone, dropping write");
        }
    }

    /// Wait until every write queued before this call has been attempted
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.tx.send(WriteOp::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }
}
