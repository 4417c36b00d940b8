//! End-to-end tests of the load generator against an in-process HTTP server.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Router,
};
use loadtest_ingest::{
    ConcurrencyPolicy, DocumentBatch, FailureBucket, LoadGenerator, LoadGeneratorConfig, MIB,
    TRANSPORT_ERROR_STATUS,
};
use loadtest_logwatch::{FixedShardCount, ShardCountSource};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Copy)]
enum Behavior {
    AlwaysOk,
    /// Every second request is rejected with 429.
    AlternateBackpressure,
    AlwaysBackpressure,
    /// Hold every request far longer than any test waits.
    Hang,
}

#[derive(Clone)]
struct ServerState {
    behavior: Behavior,
    received: Arc<AtomicU64>,
}

async fn ingest(
    State(state): State<ServerState>,
    Path(index_id): Path<String>,
    body: String,
) -> StatusCode {
    assert_eq!(index_id, "test_index");
    assert!(!body.is_empty());
    let n = state.received.fetch_add(1, Ordering::SeqCst);
    match state.behavior {
        Behavior::AlwaysOk => StatusCode::OK,
        Behavior::AlternateBackpressure if n % 2 == 1 => StatusCode::TOO_MANY_REQUESTS,
        Behavior::AlternateBackpressure => StatusCode::OK,
        Behavior::AlwaysBackpressure => StatusCode::TOO_MANY_REQUESTS,
        Behavior::Hang => {
            tokio::time::sleep(Duration::from_secs(300)).await;
            StatusCode::OK
        }
    }
}

/// Start a test ingest server; returns its base URL and request counter.
async fn start_test_server(behavior: Behavior) -> (String, Arc<AtomicU64>) {
    let received = Arc::new(AtomicU64::new(0));
    let app = Router::new()
        .route("/api/v1/:index_id/ingest", post(ingest))
        .with_state(ServerState {
            behavior,
            received: Arc::clone(&received),
        });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), received)
}

/// Config whose budget covers exactly `requests` single-pair batches.
fn config_for(base_url: &str, requests: u64) -> LoadGeneratorConfig {
    let payload = DocumentBatch::generate(1, chrono::Utc::now().timestamp())
        .unwrap()
        .len_bytes();
    LoadGeneratorConfig {
        ingest_url: format!("{base_url}/api/v1/test_index/ingest").parse().unwrap(),
        rate_mib: 1000.0,
        total_mib: (payload * requests) as f64 / MIB as f64,
        batch_pairs: 1,
        concurrency: ConcurrencyPolicy::Unbounded,
        request_timeout: Some(Duration::from_secs(5)),
        drain_timeout: Duration::from_millis(200),
    }
}

/// Returns 1, 2, 3, ... on successive reads.
struct CountingShards(AtomicU64);

impl ShardCountSource for CountingShards {
    fn shards_in_router(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[tokio::test]
async fn test_every_request_gets_one_outcome() {
    let (base_url, received) = start_test_server(Behavior::AlwaysOk).await;
    let generator = LoadGenerator::new(config_for(&base_url, 8)).unwrap();
    assert_eq!(generator.plan().iterations, 8);

    let report = generator
        .run(&FixedShardCount(1), &CancellationToken::new())
        .await;

    assert_eq!(report.requests_dispatched, 8);
    assert_eq!(report.requests_completed, 8);
    assert_eq!(report.status_count(200), 8);
    assert!(report.failures_by_shard_count.is_empty());
    assert!(!report.cancelled);
    assert_eq!(received.load(Ordering::SeqCst), 8);

    let latency = report.latency.unwrap();
    assert!(latency.p50 <= latency.p90 && latency.p90 <= latency.p99);
    assert!(latency.p99 <= latency.max);
}

#[tokio::test]
async fn test_fixed_shard_count_tags_every_failure() {
    let (base_url, _) = start_test_server(Behavior::AlternateBackpressure).await;
    let generator = LoadGenerator::new(config_for(&base_url, 6)).unwrap();

    let report = generator
        .run(&FixedShardCount(1), &CancellationToken::new())
        .await;

    assert_eq!(report.status_count(200), 3);
    assert_eq!(report.status_count(429), 3);
    assert_eq!(
        report.failures_by_shard_count,
        vec![FailureBucket {
            status_code: 429,
            shard_count: 1,
            requests: 3
        }]
    );
}

#[tokio::test]
async fn test_shard_count_is_read_at_each_dispatch() {
    let (base_url, _) = start_test_server(Behavior::AlwaysBackpressure).await;
    let generator = LoadGenerator::new(config_for(&base_url, 4)).unwrap();

    let report = generator
        .run(&CountingShards(AtomicU64::new(0)), &CancellationToken::new())
        .await;

    let shards: Vec<u64> = report
        .failures_by_shard_count
        .iter()
        .map(|b| b.shard_count)
        .collect();
    assert_eq!(shards, vec![1, 2, 3, 4]);
    assert!(report.failures_by_shard_count.iter().all(|b| b.requests == 1));
}

#[tokio::test]
async fn test_transport_failures_are_recorded_not_raised() {
    // Bind and drop a listener so the port is closed.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let generator = LoadGenerator::new(config_for(&format!("http://{addr}"), 3)).unwrap();
    let report = generator
        .run(&FixedShardCount(2), &CancellationToken::new())
        .await;

    assert_eq!(report.requests_completed, 3);
    assert_eq!(report.status_count(TRANSPORT_ERROR_STATUS), 3);
    assert_eq!(report.failures_by_shard_count[0].shard_count, 2);
}

#[tokio::test]
async fn test_budget_below_one_batch_dispatches_nothing() {
    let (base_url, received) = start_test_server(Behavior::AlwaysOk).await;
    let mut config = config_for(&base_url, 1);
    config.total_mib /= 2.0;
    let generator = LoadGenerator::new(config).unwrap();
    assert_eq!(generator.plan().iterations, 0);

    let report = generator
        .run(&FixedShardCount(1), &CancellationToken::new())
        .await;
    assert_eq!(report.requests_dispatched, 0);
    assert_eq!(report.requests_completed, 0);
    assert!(report.status_counts.is_empty());
    assert!(report.latency.is_none());
    assert_eq!(received.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cancellation_stops_dispatch_and_bounds_drain() {
    let (base_url, _) = start_test_server(Behavior::Hang).await;
    let mut config = config_for(&base_url, 1000);
    // Slow the schedule down so cancellation lands mid-run.
    config.rate_mib = config.total_mib / 1000.0 * 20.0;
    let generator = LoadGenerator::new(config).unwrap();
    assert_eq!(generator.plan().iterations, 1000);

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let report = generator.run(&FixedShardCount(1), &shutdown).await;

    assert!(report.cancelled);
    assert!(report.requests_dispatched > 0);
    assert!(report.requests_dispatched < 1000);
    assert_eq!(report.requests_completed, 0);
    assert_eq!(report.requests_aborted, report.requests_dispatched);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_pacing_holds_target_rate() {
    let (base_url, _) = start_test_server(Behavior::AlwaysOk).await;
    let mut config = config_for(&base_url, 10);
    // Ten requests at 50ms spacing: roughly half a second.
    config.rate_mib = config.total_mib / 10.0 * 20.0;
    let generator = LoadGenerator::new(config).unwrap();
    let expected = generator.plan().expected_duration();
    assert!((expected.as_secs_f64() - 0.5).abs() < 0.01);

    let report = generator
        .run(&FixedShardCount(1), &CancellationToken::new())
        .await;
    assert!(report.elapsed_secs >= 0.45, "elapsed {}", report.elapsed_secs);
    assert!(report.elapsed_secs < 3.0, "elapsed {}", report.elapsed_secs);
}
