//! Fixed-window execution of concurrent provider requests.
//!
//! The provider enforces a hard limit of 10 simultaneous connections per
//! account. Requests are run in windows of at most that many in-flight
//! tasks; every task of a window must resolve before the next window
//! starts, so the peak outstanding count can never exceed the ceiling.

use std::future::Future;
use tokio::task::JoinSet;
use tokio::time::{Duration, sleep};

use crate::errors::{Result, SyncError};

/// Hard connection limit enforced by the provider.
pub const MAX_CONCURRENT_REQUESTS: usize = 10;

/// Pause inserted between consecutive report-fetch windows to stay clear of
/// the provider's rate limiter. Content windows ride within the limit
/// tolerance and run back to back.
pub const REPORT_WINDOW_COOLDOWN: Duration = Duration::from_millis(500);

pub struct BatchFetcher {
    window_size: usize,
    cooldown: Option<Duration>,
}

impl BatchFetcher {
    pub fn new(window_size: usize, cooldown: Option<Duration>) -> Self {
        BatchFetcher {
            window_size,
            cooldown,
        }
    }

    /// Runs `tasks` in fixed windows, returning results in input order.
    ///
    /// Every spawned task carries its originating index, and the output is
    /// assembled positionally from those tags; completion order inside a
    /// window is irrelevant. Any task failure rejects the whole window with
    /// [`SyncError::BatchWindowFailure`] and abandons the remaining windows.
    pub async fn run<T, F, Fut>(&self, tasks: Vec<F>) -> Result<Vec<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let total = tasks.len();
        let mut indexed: Vec<(usize, T)> = Vec::with_capacity(total);
        let mut window = 0;
        let mut iter = tasks.into_iter().enumerate();

        loop {
            let batch: Vec<(usize, Fut)> = iter
                .by_ref()
                .take(self.window_size)
                .map(|(idx, task)| (idx, task()))
                .collect();
            if batch.is_empty() {
                break;
            }

            if window > 0 {
                if let Some(cooldown) = self.cooldown {
                    tracing::debug!(window, cooldown_ms = cooldown.as_millis() as u64, "cooldown");
                    sleep(cooldown).await;
                }
            }

            let mut join_set = JoinSet::new();
            for (idx, fut) in batch {
                join_set.spawn(async move { (idx, fut.await) });
            }

            // Dropping the JoinSet on error aborts the rest of the window.
            while let Some(joined) = join_set.join_next().await {
                match joined {
                    Ok((idx, Ok(value))) => indexed.push((idx, value)),
                    Ok((_, Err(e))) => {
                        return Err(SyncError::BatchWindowFailure {
                            window,
                            source: Box::new(e),
                        });
                    }
                    Err(e) => {
                        tracing::error!("batch task failed to join: {e}");
                        return Err(SyncError::BatchWindowFailure {
                            window,
                            source: Box::new(SyncError::TaskPanic(e.to_string())),
                        });
                    }
                }
            }

            tracing::debug!(window, "window complete");
            window += 1;
        }

        indexed.sort_unstable_by_key(|(idx, _)| *idx);
        Ok(indexed.into_iter().map(|(_, value)| value).collect())
    }
}
