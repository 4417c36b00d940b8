//! Reduction of request outcomes into the ingest report.

use crate::dispatch::ConcurrencyPolicy;
use crate::outcome::{status_label, RequestOutcome};
use crate::plan::{LoadPlan, MIB};
use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Latency percentiles over all completed requests, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencySummary {
    pub p50: f64,
    pub p90: f64,
    pub p99: f64,
    pub max: f64,
}

impl LatencySummary {
    /// `None` when there are no samples.
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let mut sorted = samples.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        Some(Self {
            p50: percentile(&sorted, 50.0),
            p90: percentile(&sorted, 90.0),
            p99: percentile(&sorted, 99.0),
            max: sorted[sorted.len() - 1],
        })
    }
}

/// Linear-interpolated percentile of an ascending, non-empty slice.
pub fn percentile(sorted: &[f64], pct: f64) -> f64 {
    let rank = (pct / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

/// Count of non-success outcomes sharing a status and a dispatch shard count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureBucket {
    pub status_code: u16,
    pub shard_count: u64,
    pub requests: u64,
}

/// Everything the load generator measured in one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub payload_bytes: u64,
    pub docs_per_request: usize,
    pub target_interval_secs: f64,
    pub iterations_planned: u64,
    pub requests_dispatched: u64,
    pub requests_completed: u64,
    /// Requests still in flight when a bounded drain expired.
    pub requests_aborted: u64,
    pub total_byte_budget: u64,
    pub bytes_sent: u64,
    pub elapsed_secs: f64,
    /// `total_byte_budget / elapsed` in MiB/s, or `bytes_sent / elapsed` when cancelled.
    pub effective_mib_per_sec: f64,
    pub concurrency: ConcurrencyPolicy,
    /// The run stopped before the schedule finished.
    pub cancelled: bool,
    pub status_counts: BTreeMap<u16, u64>,
    pub failures_by_shard_count: Vec<FailureBucket>,
    pub latency: Option<LatencySummary>,
}

/// Inputs that are not derived from the outcomes themselves.
#[derive(Debug, Clone, Copy)]
pub struct RunTotals {
    pub requests_dispatched: u64,
    pub requests_aborted: u64,
    pub elapsed: Duration,
    pub cancelled: bool,
}

impl IngestReport {
    pub fn build(
        plan: &LoadPlan,
        docs_per_request: usize,
        concurrency: ConcurrencyPolicy,
        totals: RunTotals,
        outcomes: &[RequestOutcome],
    ) -> Self {
        let mut status_counts = BTreeMap::new();
        let mut failures: BTreeMap<(u16, u64), u64> = BTreeMap::new();
        for outcome in outcomes {
            *status_counts.entry(outcome.status_code).or_insert(0) += 1;
            if !outcome.is_success() {
                *failures
                    .entry((outcome.status_code, outcome.shard_count))
                    .or_insert(0) += 1;
            }
        }
        let failures_by_shard_count = failures
            .into_iter()
            .map(|((status_code, shard_count), requests)| FailureBucket {
                status_code,
                shard_count,
                requests,
            })
            .collect();

        let latencies: Vec<f64> = outcomes.iter().map(|o| o.latency_secs).collect();
        let elapsed_secs = totals.elapsed.as_secs_f64();
        let bytes_sent = totals.requests_dispatched * plan.payload_bytes;
        // A cancelled run only covered part of the budget.
        let bytes_covered = if totals.cancelled {
            bytes_sent
        } else {
            plan.total_bytes
        };
        let effective_mib_per_sec = if elapsed_secs > 0.0 {
            bytes_covered as f64 / MIB as f64 / elapsed_secs
        } else {
            0.0
        };

        Self {
            payload_bytes: plan.payload_bytes,
            docs_per_request,
            target_interval_secs: plan.interval.as_secs_f64(),
            iterations_planned: plan.iterations,
            requests_dispatched: totals.requests_dispatched,
            requests_completed: outcomes.len() as u64,
            requests_aborted: totals.requests_aborted,
            total_byte_budget: plan.total_bytes,
            bytes_sent,
            elapsed_secs,
            effective_mib_per_sec,
            concurrency,
            cancelled: totals.cancelled,
            status_counts,
            failures_by_shard_count,
            latency: LatencySummary::from_samples(&latencies),
        }
    }

    /// Count of outcomes with `status_code`.
    pub fn status_count(&self, status_code: u16) -> u64 {
        self.status_counts.get(&status_code).copied().unwrap_or(0)
    }

    /// Render the report as text tables.
    pub fn format_table(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "Ingest: {} requests of {} docs ({} bytes) every {:.3}s, concurrency {}\n",
            format_number(self.requests_dispatched),
            format_number(self.docs_per_request as u64),
            format_number(self.payload_bytes),
            self.target_interval_secs,
            self.concurrency
        ));
        if self.cancelled {
            output.push_str(&format!(
                "Run cancelled after {}/{} planned requests ({} aborted in flight)\n",
                format_number(self.requests_dispatched),
                format_number(self.iterations_planned),
                format_number(self.requests_aborted)
            ));
        }
        output.push_str(&format!(
            "Elapsed: {}  Effective ingest rate: {:.2} MiB/s  Sent: {:.1} MiB\n",
            format_duration(self.elapsed_secs),
            self.effective_mib_per_sec,
            self.bytes_sent as f64 / MIB as f64
        ));

        let mut statuses = Table::new();
        statuses.load_preset(UTF8_FULL);
        statuses.set_header(vec!["Status", "Requests"]);
        for (status, count) in &self.status_counts {
            let label = Cell::new(status_label(*status));
            let label = if *status == crate::outcome::SUCCESS_STATUS {
                label.fg(Color::Green)
            } else {
                label.fg(Color::Red)
            };
            statuses.add_row(vec![label, Cell::new(format_number(*count))]);
        }
        output.push_str(&statuses.to_string());
        output.push('\n');

        if !self.failures_by_shard_count.is_empty() {
            let mut failures = Table::new();
            failures.load_preset(UTF8_FULL);
            failures.set_header(vec!["Status", "Shards at dispatch", "Requests"]);
            for bucket in &self.failures_by_shard_count {
                failures.add_row(vec![
                    Cell::new(status_label(bucket.status_code)),
                    Cell::new(bucket.shard_count),
                    Cell::new(format_number(bucket.requests)),
                ]);
            }
            output.push_str("Failures by router shard count:\n");
            output.push_str(&failures.to_string());
            output.push('\n');
        }

        match &self.latency {
            Some(latency) => output.push_str(&format!(
                "Request latency:\n  p50: {:.2}s\n  p90: {:.2}s\n  p99: {:.2}s\n  max: {:.2}s\n",
                latency.p50, latency.p90, latency.p99, latency.max
            )),
            None => output.push_str("Request latency: no completed requests\n"),
        }

        output
    }
}

/// Format duration in human-readable format.
pub fn format_duration(secs: f64) -> String {
    if secs < 60.0 {
        format!("{secs:.1}s")
    } else if secs < 3600.0 {
        let mins = (secs / 60.0).floor();
        let remaining_secs = secs - (mins * 60.0);
        format!("{}m {:02.0}s", mins as u64, remaining_secs)
    } else {
        let hours = (secs / 3600.0).floor();
        let remaining = secs - (hours * 3600.0);
        let mins = (remaining / 60.0).floor();
        format!("{}h {:02.0}m", hours as u64, mins as u64)
    }
}

/// Format number with thousands separators.
pub fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut result = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}
