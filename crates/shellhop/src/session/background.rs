//! Cancellable background tasks.

use std::future::Future;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A set of background tasks sharing one cancellation token.
///
/// [`BackgroundTasks::shutdown`] cancels every task and waits for each to
/// finish. Dropping the set only cancels.
#[derive(Debug, Default)]
pub struct BackgroundTasks {
    token: CancellationToken,
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl BackgroundTasks {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a task. `task` receives a token that is cancelled on shutdown.
    pub fn spawn<F, Fut>(&mut self, name: &'static str, task: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task(self.token.child_token()));
        tracing::debug!(task = name, "Started background task");
        self.handles.push((name, handle));
    }

    /// Number of tasks not yet shut down.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether no tasks are running.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Cancel every task and wait for all of them to acknowledge.
    pub async fn shutdown(&mut self) {
        self.token.cancel();
        for (name, handle) in std::mem::take(&mut self.handles) {
            match handle.await {
                Ok(()) => tracing::debug!(task = name, "Background task stopped"),
                Err(e) => tracing::warn!(task = name, error = %e, "Background task failed"),
            }
        }
    }
}

impl Drop for BackgroundTasks {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
