//! Error types for the ingest load generator.

use thiserror::Error;

/// Errors raised while preparing a load run.
///
/// Individual request failures are never errors; they are recorded as
/// outcomes.
#[derive(Error, Debug)]
pub enum IngestError {
    /// The requested rate, budget or batch cannot produce a valid plan.
    #[error("Invalid load plan: {0}")]
    InvalidPlan(String),

    /// Document serialization failed.
    #[error("Failed to serialize documents: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}
