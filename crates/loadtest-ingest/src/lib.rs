//! Rate-paced ingest load generator.
//!
//! Sends one fixed newline-delimited JSON batch to an ingest endpoint at an
//! interval chosen to hit a target byte rate, without waiting for earlier
//! requests to finish. Each request is tagged with the router shard count
//! read at dispatch time, so the report can show whether failures cluster
//! at low shard counts.
//!
//! # Example
//!
//! ```ignore
//! use loadtest_ingest::{ConcurrencyPolicy, LoadGenerator, LoadGeneratorConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let generator = LoadGenerator::new(LoadGeneratorConfig {
//!     ingest_url: "http://localhost:7280/api/v1/test_index/ingest".parse()?,
//!     rate_mib: 40.0,
//!     total_mib: 2000.0,
//!     batch_pairs: 10_000,
//!     concurrency: ConcurrencyPolicy::Unbounded,
//!     request_timeout: None,
//!     drain_timeout: std::time::Duration::from_secs(10),
//! })?;
//! let report = generator.run(run_metrics.as_ref(), &CancellationToken::new()).await;
//! println!("{}", report.format_table());
//! ```

pub mod batch;
pub mod dispatch;
pub mod error;
pub mod generator;
pub mod outcome;
pub mod plan;
pub mod report;

pub use batch::DocumentBatch;
pub use dispatch::{ConcurrencyPolicy, Dispatcher};
pub use error::IngestError;
pub use generator::{LoadGenerator, LoadGeneratorConfig};
pub use outcome::{
    status_label, OutcomeLog, RequestOutcome, BACKPRESSURE_STATUS, SUCCESS_STATUS,
    TRANSPORT_ERROR_STATUS,
};
pub use plan::{LoadPlan, MIB};
pub use report::{FailureBucket, IngestReport, LatencySummary, RunTotals};
