//! Quickwit ingest benchmark.
//!
//! Launches a Quickwit node, pushes newline-delimited JSON at its ingest
//! API at a fixed byte rate and watches its log output for shard scale-up,
//! so that rejected requests can be attributed to the shard count the
//! router had when they were sent.
//!
//! The building blocks live in their own crates:
//!
//! - `loadtest_logwatch` - log line classification and run metrics
//! - `loadtest_ingest` - the rate-paced load generator and its report
//! - `quickwit_client` - readiness probe and index creation
//!
//! # CLI Usage
//!
//! ```bash
//! # Default run: 2000 MiB at 40 MiB/s against ./quickwit.yaml
//! quickwit-ingest-bench
//!
//! # Smaller run with at most 16 requests in flight, JSON report
//! quickwit-ingest-bench --rate-mib 10 --total-mib 200 \
//!   --max-in-flight 16 --output-format json --data-dir qwdata
//! ```

pub mod cli;
pub mod config;
pub mod logs;
pub mod orchestrator;
pub mod process;
pub mod report;

pub use cli::{BenchArgs, OutputFormat};
pub use config::{parse_duration, BenchConfig, ServiceCommand};
pub use orchestrator::{setup_interrupt_handler, Orchestrator, RunOutcome, INTERRUPTED_EXIT_CODE};
pub use process::ServiceProcess;
pub use report::RunReport;
