//! CLI argument definitions for quickwit-ingest-bench.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Output format for the final report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Launch a Quickwit node, push rate-limited ingest load at it and
/// correlate request failures with shard scale-up seen in its logs.
#[derive(Parser, Debug, Clone)]
#[command(name = "quickwit-ingest-bench")]
#[command(about = "Ingest benchmark correlating request outcomes with Quickwit shard scale-up")]
#[command(version)]
pub struct BenchArgs {
    /// Service executable
    #[arg(long, default_value = "quickwit", env = "QW_BENCH_BINARY")]
    pub binary: PathBuf,

    /// Service config file, passed as `run --config <path>`
    #[arg(long, default_value = "quickwit.yaml", env = "QW_BENCH_SERVICE_CONFIG")]
    pub service_config: PathBuf,

    /// Service base URL
    #[arg(long, default_value = "http://localhost:7280", env = "QW_BENCH_URL")]
    pub url: String,

    /// Index to create and ingest into
    #[arg(long, default_value = "test_index", env = "QW_BENCH_INDEX_ID")]
    pub index_id: String,

    /// Commit timeout written into the index config
    #[arg(long, default_value = "10", env = "QW_BENCH_COMMIT_TIMEOUT")]
    pub commit_timeout_secs: u64,

    /// Target ingest rate in MiB/s
    #[arg(long, default_value = "40", env = "QW_BENCH_RATE_MIB")]
    pub rate_mib: f64,

    /// Total bytes to ingest, in MiB
    #[arg(long, default_value = "2000", env = "QW_BENCH_TOTAL_MIB")]
    pub total_mib: f64,

    /// Copies of the two template documents per request
    #[arg(long, default_value = "10000", env = "QW_BENCH_BATCH_PAIRS")]
    pub batch_pairs: usize,

    /// Cap on concurrently sending requests (unbounded when unset)
    #[arg(long, env = "QW_BENCH_MAX_IN_FLIGHT")]
    pub max_in_flight: Option<usize>,

    /// Per-request timeout (e.g., "30s")
    #[arg(long, env = "QW_BENCH_REQUEST_TIMEOUT")]
    pub request_timeout: Option<String>,

    /// How long to wait for the service to become ready
    #[arg(long, default_value = "15s", env = "QW_BENCH_READY_TIMEOUT")]
    pub ready_timeout: String,

    /// Pause between readiness probes
    #[arg(long, default_value = "1s", env = "QW_BENCH_READY_INTERVAL")]
    pub ready_interval: String,

    /// Extra wait after the first ready response
    #[arg(long, default_value = "1s", env = "QW_BENCH_READY_SETTLE")]
    pub ready_settle: String,

    /// Grace period for in-flight requests after a cancelled run
    #[arg(long, default_value = "10s", env = "QW_BENCH_DRAIN_TIMEOUT")]
    pub drain_timeout: String,

    /// How long to wait for the log watcher once the service is told to stop
    #[arg(long, default_value = "30s", env = "QW_BENCH_WATCHER_GRACE")]
    pub watcher_grace: String,

    /// Directory for the per-run service log file
    #[arg(long, default_value = "logs", env = "QW_BENCH_LOGS_DIR")]
    pub logs_dir: PathBuf,

    /// Service data directory, wiped and recreated before launch
    #[arg(long, env = "QW_BENCH_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Report format on stdout
    #[arg(long, short = 'f', value_enum, default_value = "text", env = "QW_BENCH_OUTPUT_FORMAT")]
    pub output_format: OutputFormat,

    /// Also write the JSON report to this file
    #[arg(long, env = "QW_BENCH_REPORT_JSON")]
    pub report_json: Option<PathBuf>,
}
