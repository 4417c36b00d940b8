//! Aggregate state folded from classified log events.

use crate::event::Event;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Read side of the shard count, polled by request dispatchers.
pub trait ShardCountSource: Send + Sync {
    /// Number of shards the router currently directs ingest requests to.
    fn shards_in_router(&self) -> u64;
}

/// A shard count that never changes.
#[derive(Debug, Clone, Copy)]
pub struct FixedShardCount(pub u64);

impl ShardCountSource for FixedShardCount {
    fn shards_in_router(&self) -> u64 {
        self.0
    }
}

/// A shard transition observed in the log, stamped with seconds since run start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShardTransition {
    pub shards: u64,
    pub elapsed_secs: f64,
}

#[derive(Debug, Default)]
struct Timeline {
    shard_scale_up: Vec<ShardTransition>,
    router_inserts: Vec<ShardTransition>,
}

/// Counters and shard timelines for one benchmark run.
///
/// Written by the log watcher, read concurrently by every dispatch task.
/// The router starts with exactly one shard and only ever gains shards, so
/// [`RunMetrics::shards_in_router`] never decreases.
#[derive(Debug)]
pub struct RunMetrics {
    started_at: Instant,
    warn_count: AtomicU64,
    error_count: AtomicU64,
    slow_lock: AtomicU64,
    router_shards_added: AtomicU64,
    timeline: Mutex<Timeline>,
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RunMetrics {
    /// Create empty metrics; elapsed times are measured from now.
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            warn_count: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
            slow_lock: AtomicU64::new(0),
            router_shards_added: AtomicU64::new(0),
            timeline: Mutex::new(Timeline::default()),
        }
    }

    /// Time since the run started.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Fold one event into the aggregate.
    pub fn record(&self, event: &Event, elapsed: Duration) {
        let elapsed_secs = elapsed.as_secs_f64();
        match *event {
            Event::Warning => {
                self.warn_count.fetch_add(1, Ordering::Relaxed);
            }
            Event::Error => {
                self.error_count.fetch_add(1, Ordering::Relaxed);
            }
            Event::SlowLockAcquisition => {
                self.slow_lock.fetch_add(1, Ordering::Relaxed);
            }
            Event::ShardScaleUp { new_shard_count } => {
                self.timeline().shard_scale_up.push(ShardTransition {
                    shards: new_shard_count,
                    elapsed_secs,
                });
            }
            Event::RouterShardInsert { shards_added } => {
                self.timeline().router_inserts.push(ShardTransition {
                    shards: shards_added,
                    elapsed_secs,
                });
                self.router_shards_added.fetch_add(shards_added, Ordering::Release);
            }
        }
    }

    pub fn warn_count(&self) -> u64 {
        self.warn_count.load(Ordering::Relaxed)
    }

    pub fn error_count(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    pub fn slow_lock_count(&self) -> u64 {
        self.slow_lock.load(Ordering::Relaxed)
    }

    /// Point-in-time copy of everything recorded so far.
    pub fn summary(&self) -> LogSummary {
        let timeline = self.timeline();
        LogSummary {
            warn_count: self.warn_count(),
            error_count: self.error_count(),
            slow_lock: self.slow_lock_count(),
            shard_scale_up: timeline.shard_scale_up.clone(),
            router_scale_up: timeline.router_inserts.clone(),
            shards_in_router: self.shards_in_router(),
        }
    }

    fn timeline(&self) -> std::sync::MutexGuard<'_, Timeline> {
        self.timeline.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ShardCountSource for RunMetrics {
    fn shards_in_router(&self) -> u64 {
        1 + self.router_shards_added.load(Ordering::Acquire)
    }
}

/// Snapshot of [`RunMetrics`] for reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSummary {
    pub warn_count: u64,
    pub error_count: u64,
    pub slow_lock: u64,
    pub shard_scale_up: Vec<ShardTransition>,
    pub router_scale_up: Vec<ShardTransition>,
    pub shards_in_router: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_router_starts_with_one_shard() {
        let metrics = RunMetrics::new();
        assert_eq!(metrics.shards_in_router(), 1);
        assert!(metrics.summary().router_scale_up.is_empty());
    }

    #[test]
    fn test_router_inserts_accumulate_monotonically() {
        let metrics = RunMetrics::new();
        let mut previous = metrics.shards_in_router();
        for (i, added) in [2u64, 3, 1].into_iter().enumerate() {
            metrics.record(
                &Event::RouterShardInsert {
                    shards_added: added,
                },
                Duration::from_secs(i as u64),
            );
            let current = metrics.shards_in_router();
            assert!(current >= previous);
            previous = current;
        }
        assert_eq!(metrics.shards_in_router(), 7);

        let summary = metrics.summary();
        let added: Vec<u64> = summary.router_scale_up.iter().map(|t| t.shards).collect();
        assert_eq!(added, vec![2, 3, 1]);
        assert_eq!(summary.shards_in_router, 7);
    }

    #[test]
    fn test_counts_and_scale_up_series() {
        let metrics = RunMetrics::new();
        metrics.record(&Event::Warning, Duration::from_millis(10));
        metrics.record(&Event::Error, Duration::from_millis(20));
        metrics.record(&Event::SlowLockAcquisition, Duration::from_millis(30));
        metrics.record(
            &Event::ShardScaleUp { new_shard_count: 3 },
            Duration::from_millis(1500),
        );

        let summary = metrics.summary();
        assert_eq!(summary.warn_count, 1);
        assert_eq!(summary.error_count, 1);
        assert_eq!(summary.slow_lock, 1);
        assert_eq!(
            summary.shard_scale_up,
            vec![ShardTransition {
                shards: 3,
                elapsed_secs: 1.5
            }]
        );
        // Scale-up of the pipeline does not touch the routing table count.
        assert_eq!(summary.shards_in_router, 1);
    }

    #[test]
    fn test_concurrent_reads_during_writes() {
        let metrics = Arc::new(RunMetrics::new());
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let metrics = Arc::clone(&metrics);
                std::thread::spawn(move || {
                    let mut last = 1;
                    for _ in 0..1000 {
                        let now = metrics.shards_in_router();
                        assert!(now >= last);
                        last = now;
                    }
                })
            })
            .collect();

        for _ in 0..100 {
            metrics.record(
                &Event::RouterShardInsert { shards_added: 1 },
                Duration::ZERO,
            );
        }
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(metrics.shards_in_router(), 101);
    }

    #[test]
    fn test_fixed_shard_count() {
        assert_eq!(FixedShardCount(4).shards_in_router(), 4);
    }
}
