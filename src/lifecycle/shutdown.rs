//! Shutdown coordination.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Coordinator for graceful shutdown.
///
/// Wraps a root cancellation token. Long-running tasks take a child token and
/// stop when it is cancelled.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    root: CancellationToken,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token for one task. Cancelling it does not affect the root.
    pub fn token(&self) -> CancellationToken {
        self.root.child_token()
    }

    pub fn trigger(&self) {
        self.root.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.root.is_cancelled()
    }

    /// Resolves once shutdown has been triggered.
    pub async fn triggered(&self) {
        self.root.cancelled().await;
    }

    /// Wait up to `grace` for `task` to finish after shutdown, then abort it.
    pub async fn drain<T>(&self, task: JoinHandle<T>, grace: Duration) {
        let abort = task.abort_handle();
        match tokio::time::timeout(grace, task).await {
            Ok(Ok(_)) => tracing::debug!("task drained"),
            Ok(Err(e)) => tracing::warn!(error = %e, "task ended abnormally during shutdown"),
            Err(_) => {
                tracing::warn!(grace = ?grace, "task did not stop in time, aborting");
                abort.abort();
            }
        }
    }
}
