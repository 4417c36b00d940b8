//! Log-event correlation for the ingest benchmark.
//!
//! The service under test reports shard transitions only through its log
//! output. This crate turns that output into data the load generator can
//! correlate with request outcomes:
//!
//! 1. [`classify`] maps one log line to zero, one or two [`Event`]s
//! 2. [`RunMetrics`] folds events into counters and shard timelines
//! 3. [`LogStreamWatcher`] drives both over a live line stream while
//!    persisting every raw line to a sink
//!
//! # Example
//!
//! ```ignore
//! use loadtest_logwatch::{line_stream, LogStreamWatcher, RunMetrics, ShardCountSource};
//! use std::sync::Arc;
//!
//! let metrics = Arc::new(RunMetrics::new());
//! let watcher = LogStreamWatcher::new(line_stream(child_stdout), log_file, metrics.clone());
//! let handle = tokio::spawn(watcher.run());
//! // ... later, from any task:
//! let shards = metrics.shards_in_router();
//! ```

pub mod event;
pub mod run_metrics;
pub mod watcher;

pub use event::{classify, ClassifyError, Event};
pub use run_metrics::{FixedShardCount, LogSummary, RunMetrics, ShardCountSource, ShardTransition};
pub use watcher::{line_stream, merge_lines, LogStreamWatcher, WatchError, WatchSummary};
