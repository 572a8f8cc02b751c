use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::{JoinError, JoinSet};

/// Await `future`, converting a panic into its message.
///
/// Fetch tasks owe their caller exactly one completion; a panic inside the
/// fetcher or cache must still produce one, so the repository reports the
/// message as an error instead of letting the task die silently.
pub async fn catch_task_panic<F, T>(future: F) -> Result<T, String>
where
    F: std::future::Future<Output = T>,
{
    AssertUnwindSafe(future).catch_unwind().await.map_err(|panic| {
        if let Some(s) = panic.downcast_ref::<&'static str>() {
            s.to_string()
        } else if let Some(s) = panic.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        }
    })
}

/// Detached side-effect tasks (cache write-backs, recent-query saves).
///
/// Callers never wait on these, but a process that is about to close the
/// database must: [`BackgroundTasks::drain`] resolves once every task
/// spawned so far, and every task those tasks spawned, has finished.
/// Clones share one set.
#[derive(Clone, Default)]
pub struct BackgroundTasks {
    set: Arc<Mutex<JoinSet<()>>>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `future` onto the current runtime and track it.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut set = self.lock();
        // Reap finished tasks so a long-lived tracker does not grow
        while let Some(result) = set.try_join_next() {
            log_join_error(result);
        }
        set.spawn(future);
    }

    /// Number of tracked tasks not yet reaped.
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    /// Wait for every tracked task to finish.
    pub async fn drain(&self) {
        loop {
            // Never hold the lock across an await; tasks may spawn more work
            let mut batch = std::mem::take(&mut *self.lock());
            if batch.is_empty() {
                return;
            }
            tracing::debug!(tasks = batch.len(), "Waiting for background tasks");
            while let Some(result) = batch.join_next().await {
                log_join_error(result);
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.set.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn log_join_error(result: Result<(), JoinError>) {
    if let Err(e) = result {
        if e.is_panic() {
            tracing::warn!(error = %e, "Background task panicked");
        }
    }
}
