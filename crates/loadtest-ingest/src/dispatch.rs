//! Task-spawning policy for request dispatch.
//!
//! Spawning never waits: the pacing loop hands each request to
//! [`Dispatcher::spawn`] and moves on. Under [`ConcurrencyPolicy::Bounded`]
//! the spawned task queues on a semaphore before it sends, so at most `n`
//! requests are on the wire while the schedule keeps ticking.

use crate::error::IngestError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, warn};

/// How many requests may be in flight at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", content = "max_in_flight", rename_all = "snake_case")]
pub enum ConcurrencyPolicy {
    /// One new task per dispatch tick, no cap.
    #[default]
    Unbounded,
    /// At most this many requests sending concurrently.
    Bounded(usize),
}

impl ConcurrencyPolicy {
    /// `None` means unbounded; `Some(0)` is rejected.
    pub fn from_limit(limit: Option<usize>) -> Result<Self, IngestError> {
        match limit {
            None => Ok(Self::Unbounded),
            Some(0) => Err(IngestError::InvalidPlan(
                "max in-flight requests must be at least 1".to_string(),
            )),
            Some(n) => Ok(Self::Bounded(n)),
        }
    }
}

impl std::fmt::Display for ConcurrencyPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConcurrencyPolicy::Unbounded => write!(f, "unbounded"),
            ConcurrencyPolicy::Bounded(n) => write!(f, "bounded({n})"),
        }
    }
}

/// Owns every spawned request task until it is joined or aborted.
pub struct Dispatcher {
    tasks: JoinSet<()>,
    gate: Option<Arc<Semaphore>>,
}

impl Dispatcher {
    pub fn new(policy: ConcurrencyPolicy) -> Self {
        let gate = match policy {
            ConcurrencyPolicy::Unbounded => None,
            ConcurrencyPolicy::Bounded(n) => Some(Arc::new(Semaphore::new(n))),
        };
        Self {
            tasks: JoinSet::new(),
            gate,
        }
    }

    /// Spawn `request` without waiting for it.
    pub fn spawn<F>(&mut self, request: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let gate = self.gate.clone();
        self.tasks.spawn(async move {
            let _permit = match gate {
                Some(gate) => match gate.acquire_owned().await {
                    Ok(permit) => Some(permit),
                    Err(_) => return,
                },
                None => None,
            };
            request.await;
        });
        self.reap_finished();
    }

    /// Tasks spawned and not yet joined.
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Wait for every task to finish.
    pub async fn join_all(&mut self) {
        while let Some(result) = self.tasks.join_next().await {
            log_join_failure(result);
        }
    }

    /// Wait up to `timeout` for tasks to finish, then abort the rest.
    ///
    /// Returns how many tasks were aborted.
    pub async fn drain(&mut self, timeout: Duration) -> u64 {
        if tokio::time::timeout(timeout, self.join_all()).await.is_ok() {
            return 0;
        }

        let remaining = self.tasks.len() as u64;
        warn!("Aborting {remaining} in-flight requests after {timeout:?} drain");
        self.tasks.abort_all();
        while let Some(result) = self.tasks.join_next().await {
            if let Err(e) = result {
                if !e.is_cancelled() {
                    warn!("Request task failed: {e}");
                }
            }
        }
        remaining
    }

    fn reap_finished(&mut self) {
        while let Some(result) = self.tasks.try_join_next() {
            log_join_failure(result);
        }
    }
}

fn log_join_failure(result: Result<(), JoinError>) {
    match result {
        Ok(()) => {}
        Err(e) if e.is_cancelled() => debug!("Request task cancelled"),
        Err(e) => warn!("Request task failed: {e}"),
    }
}
