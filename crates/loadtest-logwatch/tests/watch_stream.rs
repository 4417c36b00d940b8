//! Integration tests for the log watcher over live streams and file sinks.

use loadtest_logwatch::{line_stream, LogStreamWatcher, RunMetrics, ShardCountSource, WatchError};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// Wait until `check` holds, polling briefly.
async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn test_shard_count_updates_as_lines_arrive() {
    let (mut service_out, harness_in) = tokio::io::duplex(1024);
    let metrics = Arc::new(RunMetrics::new());
    let temp_dir = tempfile::tempdir().unwrap();
    let log_path = temp_dir.path().join("run.log");
    let sink = tokio::fs::File::create(&log_path).await.unwrap();

    let watcher = LogStreamWatcher::new(line_stream(harness_in), sink, Arc::clone(&metrics));
    let handle = tokio::spawn(watcher.run());

    service_out
        .write_all(b"INFO router: inserted 2 shards into routing table\n")
        .await
        .unwrap();
    eventually(|| metrics.shards_in_router() == 3).await;

    service_out
        .write_all(b"WARN router: inserted 4 shards into routing table\n")
        .await
        .unwrap();
    eventually(|| metrics.shards_in_router() == 7).await;
    assert_eq!(metrics.warn_count(), 1);

    // Closing the service side ends the watcher.
    drop(service_out);
    let summary = handle.await.unwrap().unwrap();
    assert_eq!(summary.lines_seen, 2);

    let persisted = tokio::fs::read_to_string(&log_path).await.unwrap();
    assert_eq!(
        persisted,
        "INFO router: inserted 2 shards into routing table\n\
         WARN router: inserted 4 shards into routing table\n"
    );
}

#[tokio::test]
async fn test_fatal_line_survives_in_sink_file() {
    let input: &[u8] = b"INFO boot\nINFO inserted many shards into routing table\nINFO tail\n";
    let metrics = Arc::new(RunMetrics::new());
    let temp_dir = tempfile::tempdir().unwrap();
    let log_path = temp_dir.path().join("fatal.log");
    let sink = tokio::fs::File::create(&log_path).await.unwrap();

    let result = LogStreamWatcher::new(line_stream(input), sink, metrics)
        .run()
        .await;
    assert!(matches!(result, Err(WatchError::Classify(_))));

    let persisted = tokio::fs::read_to_string(&log_path).await.unwrap();
    assert_eq!(
        persisted,
        "INFO boot\nINFO inserted many shards into routing table\n"
    );
}
