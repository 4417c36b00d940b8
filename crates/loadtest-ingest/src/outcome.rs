//! Per-request outcome records.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};

/// Status recorded when a request fails below HTTP (connect, timeout, reset).
pub const TRANSPORT_ERROR_STATUS: u16 = 0;

/// Status of a successful ingest.
pub const SUCCESS_STATUS: u16 = 200;

/// Status the service uses for backpressure.
pub const BACKPRESSURE_STATUS: u16 = 429;

/// Result of one ingest request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RequestOutcome {
    /// HTTP status, or [`TRANSPORT_ERROR_STATUS`].
    pub status_code: u16,
    /// Router shard count read when the request was dispatched.
    pub shard_count: u64,
    /// Time from send to full response.
    pub latency_secs: f64,
}

impl RequestOutcome {
    pub fn is_success(&self) -> bool {
        self.status_code == SUCCESS_STATUS
    }
}

/// Human label for a recorded status code.
pub fn status_label(status_code: u16) -> String {
    match status_code {
        TRANSPORT_ERROR_STATUS => "transport error".to_string(),
        SUCCESS_STATUS => "200 OK".to_string(),
        BACKPRESSURE_STATUS => "429 backpressure".to_string(),
        other => other.to_string(),
    }
}

/// Completion-ordered outcome sequence shared by all request tasks.
#[derive(Debug, Clone, Default)]
pub struct OutcomeLog {
    outcomes: Arc<Mutex<Vec<RequestOutcome>>>,
}

impl OutcomeLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one outcome; called once by the task that issued the request.
    pub fn push(&self, outcome: RequestOutcome) {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(outcome);
    }

    /// Take everything recorded so far, leaving the log empty.
    pub fn take(&self) -> Vec<RequestOutcome> {
        std::mem::take(&mut *self.outcomes.lock().unwrap_or_else(PoisonError::into_inner))
    }
}
