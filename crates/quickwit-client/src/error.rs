//! Errors raised by the Quickwit client.

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    /// The service never answered the readiness probe positively.
    #[error("Service at {url} did not become ready within {timeout:?} (last error: {last_error})")]
    NotReady {
        url: String,
        timeout: Duration,
        last_error: String,
    },

    /// Index creation returned a non-200 status.
    #[error("Failed to create index {index_id} ({status}): {body}")]
    IndexCreation {
        index_id: String,
        status: u16,
        body: String,
    },

    #[error("Failed to serialize index config: {0}")]
    IndexConfig(#[from] serde_yaml::Error),

    #[error("Invalid service URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Why a single readiness probe did not report ready.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Error checking health: {0}")]
    Unreachable(#[source] reqwest::Error),

    #[error("Error: {0}")]
    Status(u16),

    #[error("Invalid readiness body: {0}")]
    InvalidBody(#[source] reqwest::Error),

    #[error("Not ready: {0}")]
    NotReady(serde_json::Value),

    #[error(transparent)]
    Endpoint(Box<ClientError>),
}
