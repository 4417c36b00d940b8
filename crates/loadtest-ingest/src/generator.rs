//! Interval-paced ingest load generator.

use crate::batch::DocumentBatch;
use crate::dispatch::{ConcurrencyPolicy, Dispatcher};
use crate::error::IngestError;
use crate::outcome::{OutcomeLog, RequestOutcome, TRANSPORT_ERROR_STATUS};
use crate::plan::LoadPlan;
use crate::report::{IngestReport, RunTotals};
use bytes::Bytes;
use loadtest_logwatch::ShardCountSource;
use reqwest::{Client, Url};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Settings for one load run.
#[derive(Debug, Clone)]
pub struct LoadGeneratorConfig {
    /// Full ingest endpoint, e.g. `http://localhost:7280/api/v1/test_index/ingest`.
    pub ingest_url: Url,
    /// Target throughput in MiB/s.
    pub rate_mib: f64,
    /// Total budget in MiB.
    pub total_mib: f64,
    /// The batch holds this many copies of the two template documents.
    pub batch_pairs: usize,
    pub concurrency: ConcurrencyPolicy,
    /// Per-request timeout; `None` waits for the service indefinitely.
    pub request_timeout: Option<Duration>,
    /// Grace period for in-flight requests once a run is cancelled.
    pub drain_timeout: Duration,
}

/// Sends the same document batch at a fixed interval and records every outcome.
pub struct LoadGenerator {
    client: Client,
    ingest_url: Url,
    batch: DocumentBatch,
    plan: LoadPlan,
    concurrency: ConcurrencyPolicy,
    drain_timeout: Duration,
}

impl LoadGenerator {
    /// Build the batch once and derive the dispatch plan from its size.
    pub fn new(config: LoadGeneratorConfig) -> Result<Self, IngestError> {
        let batch = DocumentBatch::generate(config.batch_pairs, chrono::Utc::now().timestamp())?;
        let plan = LoadPlan::from_mib(batch.len_bytes(), config.rate_mib, config.total_mib)?;

        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            ingest_url: config.ingest_url,
            batch,
            plan,
            concurrency: config.concurrency,
            drain_timeout: config.drain_timeout,
        })
    }

    pub fn plan(&self) -> &LoadPlan {
        &self.plan
    }

    /// Run the schedule to completion or until `shutdown` fires.
    ///
    /// Every dispatch reads `shards` at dispatch time and tags the outcome
    /// with it. On normal completion all requests are awaited; after
    /// cancellation they get the drain timeout and are then aborted.
    pub async fn run<S>(&self, shards: &S, shutdown: &CancellationToken) -> IngestReport
    where
        S: ShardCountSource + ?Sized,
    {
        let plan = self.plan;
        info!(
            "Ingesting {} docs ({} bytes) per request every {:.3}s, {} requests planned, concurrency {}",
            self.batch.doc_count(),
            plan.payload_bytes,
            plan.interval.as_secs_f64(),
            plan.iterations,
            self.concurrency
        );

        let outcomes = OutcomeLog::new();
        let mut dispatcher = Dispatcher::new(self.concurrency);
        let progress_step = (plan.iterations / 20).max(1);
        let started = Instant::now();
        let schedule_start = tokio::time::Instant::now();
        let mut dispatched = 0u64;
        let mut cancelled = false;

        for index in 0..plan.iterations {
            if shutdown.is_cancelled() {
                cancelled = true;
                break;
            }

            let shard_count = shards.shards_in_router();
            dispatcher.spawn(send_ingest(
                self.client.clone(),
                self.ingest_url.clone(),
                self.batch.payload(),
                shard_count,
                outcomes.clone(),
            ));
            dispatched += 1;

            if dispatched % progress_step == 0 {
                debug!(
                    "Dispatched {dispatched}/{} requests ({} in flight, {} shards)",
                    plan.iterations,
                    dispatcher.in_flight(),
                    shard_count
                );
            }

            let next_dispatch = schedule_start + plan.dispatch_offset(index + 1);
            tokio::select! {
                _ = shutdown.cancelled() => {
                    cancelled = true;
                    break;
                }
                _ = tokio::time::sleep_until(next_dispatch) => {}
            }
        }

        let requests_aborted = if cancelled {
            info!(
                "Load run cancelled after {dispatched} requests, draining {} in flight",
                dispatcher.in_flight()
            );
            dispatcher.drain(self.drain_timeout).await
        } else {
            dispatcher.join_all().await;
            0
        };

        let totals = RunTotals {
            requests_dispatched: dispatched,
            requests_aborted,
            elapsed: started.elapsed(),
            cancelled,
        };
        IngestReport::build(
            &plan,
            self.batch.doc_count(),
            self.concurrency,
            totals,
            &outcomes.take(),
        )
    }
}

/// Send one batch and record its outcome. Never fails: transport errors
/// become [`TRANSPORT_ERROR_STATUS`].
async fn send_ingest(
    client: Client,
    url: Url,
    payload: Bytes,
    shard_count: u64,
    outcomes: OutcomeLog,
) {
    let started = Instant::now();
    let status_code = match client.post(url).body(payload).send().await {
        Ok(response) => {
            let status = response.status().as_u16();
            if let Err(e) = response.bytes().await {
                debug!("Failed to read ingest response body (status {status}): {e}");
            }
            status
        }
        Err(e) => {
            debug!("Ingest request failed: {e}");
            TRANSPORT_ERROR_STATUS
        }
    };

    outcomes.push(RequestOutcome {
        status_code,
        shard_count,
        latency_secs: started.elapsed().as_secs_f64(),
    });
}
