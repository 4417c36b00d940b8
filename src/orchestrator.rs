//! Benchmark run sequencing.
//!
//! One run launches the service, waits until it is ready, creates the
//! index and drives the load generator while a background task watches the
//! service's output. Whatever happens, the service is stopped and the log
//! watcher joined before the report is assembled.

use crate::config::BenchConfig;
use crate::logs::{open_log_sink, reset_data_dir};
use crate::process::ServiceProcess;
use crate::report::RunReport;
use anyhow::Context;
use chrono::Local;
use loadtest_ingest::{IngestReport, LoadGenerator, LoadPlan};
use loadtest_logwatch::{LogStreamWatcher, RunMetrics, WatchError, WatchSummary};
use quickwit_client::{IndexConfig, QuickwitClient};
use std::process::ExitStatus;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Process exit status after an interrupt signal.
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

type WatcherHandle = JoinHandle<Result<WatchSummary, WatchError>>;

/// Result of a run that got as far as launching the service.
#[derive(Debug)]
pub struct RunOutcome {
    pub report: RunReport,
    /// First failure of the run, if any.
    pub error: Option<anyhow::Error>,
    pub interrupted: bool,
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        if self.interrupted {
            INTERRUPTED_EXIT_CODE
        } else if self.error.is_some() {
            1
        } else {
            0
        }
    }
}

/// What teardown learned about the watcher and the service.
struct Teardown {
    watch: Option<Result<WatchSummary, WatchError>>,
    service_status: Option<ExitStatus>,
}

pub struct Orchestrator {
    config: BenchConfig,
    client: QuickwitClient,
    generator: LoadGenerator,
}

impl Orchestrator {
    /// Validate everything that can be checked before the service starts.
    pub fn new(config: BenchConfig) -> anyhow::Result<Self> {
        let client = QuickwitClient::new(&config.base_url)?;
        let generator = LoadGenerator::new(config.load_generator(&client)?)
            .context("Failed to prepare load generator")?;
        Ok(Self {
            config,
            client,
            generator,
        })
    }

    pub fn plan(&self) -> &LoadPlan {
        self.generator.plan()
    }

    /// Run the benchmark once.
    ///
    /// Cancelling `interrupt` stops the service immediately, skips the
    /// remaining steps and yields a partial report. An `Err` means the run
    /// failed before the service was launched.
    pub async fn run(&self, interrupt: CancellationToken) -> anyhow::Result<RunOutcome> {
        let started_at = Local::now();
        if let Some(data_dir) = &self.config.data_dir {
            reset_data_dir(data_dir).await?;
        }
        let (log_file, sink) = open_log_sink(&self.config.logs_dir, started_at).await?;

        let metrics = Arc::new(RunMetrics::new());
        let mut service = ServiceProcess::spawn(&self.config.service)?;
        let lines = service
            .diagnostic_lines()
            .context("Service output is not captured")?;

        // Cancelled by the interrupt, or by the watcher on a fatal log line.
        let run_token = interrupt.child_token();
        let watcher = LogStreamWatcher::new(lines, sink, Arc::clone(&metrics));
        let watcher_token = run_token.clone();
        let mut watcher_handle: WatcherHandle = tokio::spawn(async move {
            let result = watcher.run().await;
            if let Err(e) = &result {
                error!("Log watcher stopped the run: {e}");
                watcher_token.cancel();
            }
            result
        });

        let drive = self.drive(&metrics, &run_token);
        tokio::pin!(drive);
        let driven = tokio::select! {
            result = &mut drive => result,
            _ = interrupt.cancelled() => {
                info!("Interrupted, stopping service");
                if let Err(e) = service.terminate() {
                    warn!("{e:#}");
                }
                drive.await
            }
        };

        let teardown = self.teardown(&mut service, &mut watcher_handle).await;

        let interrupted = interrupt.is_cancelled();
        let (ingest, mut error) = match driven {
            Ok(ingest) => (ingest, None),
            Err(e) => (None, Some(e)),
        };
        let log_lines = match teardown.watch {
            Some(Ok(summary)) => Some(summary.lines_seen),
            Some(Err(e)) => {
                if error.is_none() {
                    error = Some(anyhow::Error::new(e).context("Service log could not be processed"));
                }
                None
            }
            None => {
                if error.is_none() {
                    error = Some(anyhow::anyhow!("Log watcher did not finish"));
                }
                None
            }
        };
        if let Some(e) = &error {
            error!("Run failed: {e:#}");
        }

        let report = RunReport {
            started_at: started_at.to_rfc3339(),
            log_file,
            index_id: self.config.index_id.clone(),
            interrupted,
            error: error.as_ref().map(|e| format!("{e:#}")),
            ingest,
            logs: metrics.summary(),
            log_lines,
            service_exit_code: teardown.service_status.and_then(|s| s.code()),
        };

        Ok(RunOutcome {
            report,
            error,
            interrupted,
        })
    }

    /// Readiness, index creation and the load run. `Ok(None)` when the run
    /// was cancelled before load generation began.
    async fn drive(
        &self,
        metrics: &RunMetrics,
        run_token: &CancellationToken,
    ) -> anyhow::Result<Option<IngestReport>> {
        tokio::select! {
            _ = run_token.cancelled() => return Ok(None),
            ready = self.client.wait_ready(self.config.readiness) => {
                ready.context("Service failed to start")?;
            }
        }

        let index_config =
            IndexConfig::benchmark(self.config.index_id.as_str(), self.config.commit_timeout_secs);
        tokio::select! {
            _ = run_token.cancelled() => return Ok(None),
            created = self.client.create_index(&index_config) => {
                created.context("Index setup failed")?;
            }
        }

        Ok(Some(self.generator.run(metrics, run_token).await))
    }

    /// Stop the service and join the watcher, escalating to a kill when the
    /// watcher does not finish within the grace period.
    async fn teardown(
        &self,
        service: &mut ServiceProcess,
        watcher: &mut WatcherHandle,
    ) -> Teardown {
        let grace = self.config.watcher_grace;
        info!("Stopping service");
        if let Err(e) = service.terminate() {
            warn!("{e:#}");
        }

        let joined = match tokio::time::timeout(grace, &mut *watcher).await {
            Ok(joined) => Some(joined),
            Err(_) => {
                warn!("Log watcher still running after {grace:?}, killing service");
                kill_quietly(service).await;
                match tokio::time::timeout(grace, &mut *watcher).await {
                    Ok(joined) => Some(joined),
                    Err(_) => {
                        warn!("Log watcher did not stop after the service was killed");
                        watcher.abort();
                        None
                    }
                }
            }
        };

        let watch = match joined {
            Some(Ok(result)) => Some(result),
            Some(Err(join_error)) => {
                warn!("Failed to join log watcher: {join_error}");
                kill_quietly(service).await;
                None
            }
            None => None,
        };

        let service_status = match service.wait(grace).await {
            Some(status) => Some(status),
            None => {
                warn!("Service still running after {grace:?}");
                kill_quietly(service).await;
                service.try_status()
            }
        };
        info!("Service stopped");

        Teardown {
            watch,
            service_status,
        }
    }
}

async fn kill_quietly(service: &mut ServiceProcess) {
    if let Err(e) = service.kill().await {
        warn!("{e:#}");
    }
}

/// Cancel `interrupt` on Ctrl+C.
pub fn setup_interrupt_handler(interrupt: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received interrupt signal (Ctrl+C)");
                interrupt.cancel();
            }
            Err(e) => warn!("Failed to listen for Ctrl+C: {e}"),
        }
    });
}
