//! Final report combining the load run with what the service logged.

use anyhow::Context;
use comfy_table::{presets::UTF8_FULL, Cell, Table};
use loadtest_ingest::report::{format_duration, format_number};
use loadtest_ingest::IngestReport;
use loadtest_logwatch::{LogSummary, ShardTransition};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Local run start, RFC 3339.
    pub started_at: String,
    pub log_file: PathBuf,
    pub index_id: String,
    /// Stopped by an interrupt signal.
    pub interrupted: bool,
    /// What ended the run early, if anything did.
    pub error: Option<String>,
    /// Absent when the run ended before load generation started.
    pub ingest: Option<IngestReport>,
    pub logs: LogSummary,
    /// Lines read from the service; `None` if the log watcher failed.
    pub log_lines: Option<u64>,
    /// Service exit code; `None` if it was killed by a signal or never reaped.
    pub service_exit_code: Option<i32>,
}

impl RunReport {
    pub fn to_json(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize run report")
    }

    pub fn write_json(&self, path: &Path) -> anyhow::Result<()> {
        std::fs::write(path, self.to_json()?)
            .with_context(|| format!("Failed to write report to {}", path.display()))
    }

    /// Human-readable report.
    pub fn format_text(&self) -> String {
        let mut output = String::new();
        output.push_str(&format!(
            "Run started {} on index {}\n",
            self.started_at, self.index_id
        ));
        if self.interrupted {
            output.push_str("Run interrupted, results are partial\n");
        }
        if let Some(error) = &self.error {
            output.push_str(&format!("Run failed: {error}\n"));
        }
        output.push('\n');

        match &self.ingest {
            Some(ingest) => output.push_str(&ingest.format_table()),
            None => output.push_str("Ingest: no load was generated\n"),
        }
        output.push('\n');

        output.push_str(&format_log_summary(&self.logs, self.log_lines));
        output.push_str(&format!("\nLogs written to {}\n", self.log_file.display()));
        output
    }
}

fn format_log_summary(logs: &LogSummary, log_lines: Option<u64>) -> String {
    let mut output = String::new();

    let mut counts = Table::new();
    counts.load_preset(UTF8_FULL);
    counts.set_header(vec!["Service log", "Count"]);
    if let Some(lines) = log_lines {
        counts.add_row(vec![Cell::new("Lines"), Cell::new(format_number(lines))]);
    }
    counts.add_row(vec![Cell::new("WARN"), Cell::new(format_number(logs.warn_count))]);
    counts.add_row(vec![Cell::new("ERROR"), Cell::new(format_number(logs.error_count))]);
    counts.add_row(vec![
        Cell::new("Slow lock acquisitions"),
        Cell::new(format_number(logs.slow_lock)),
    ]);
    counts.add_row(vec![
        Cell::new("Shards in router"),
        Cell::new(logs.shards_in_router),
    ]);
    output.push_str(&counts.to_string());
    output.push('\n');

    output.push_str(&format_timeline("Shard scale-up", &logs.shard_scale_up));
    output.push_str(&format_timeline("Router shard inserts", &logs.router_scale_up));
    output
}

fn format_timeline(title: &str, transitions: &[ShardTransition]) -> String {
    if transitions.is_empty() {
        return format!("{title}: none\n");
    }
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["At", "Shards"]);
    for transition in transitions {
        table.add_row(vec![
            Cell::new(format_duration(transition.elapsed_secs)),
            Cell::new(transition.shards),
        ]);
    }
    format!("{title}:\n{table}\n")
}
