//! Consumer of the service's diagnostic output.

use crate::event::{classify, ClassifyError, Event};
use crate::run_metrics::RunMetrics;
use std::io;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio_stream::wrappers::SplitStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, error, info, warn};

/// Errors that end the watcher early.
#[derive(Error, Debug)]
pub enum WatchError {
    /// The service logged a shard line the classifier cannot read.
    #[error(transparent)]
    Classify(#[from] ClassifyError),

    /// The durable log sink could not be written.
    #[error("Failed to write to log sink: {0}")]
    Sink(#[source] io::Error),
}

/// Totals reported by a watcher that ran to the end of its stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchSummary {
    pub lines_seen: u64,
    pub events_recorded: u64,
}

/// Split a byte stream into lines, decoding lossily and dropping a trailing `\r`.
pub fn line_stream<R>(reader: R) -> impl Stream<Item = io::Result<String>> + Unpin
where
    R: AsyncRead + Unpin,
{
    SplitStream::new(BufReader::new(reader).split(b'\n')).map(|chunk| {
        chunk.map(|mut bytes| {
            if bytes.last() == Some(&b'\r') {
                bytes.pop();
            }
            String::from_utf8(bytes)
                .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
        })
    })
}

/// Interleave two line streams in arrival order.
pub fn merge_lines<A, B>(a: A, b: B) -> impl Stream<Item = io::Result<String>> + Unpin
where
    A: Stream<Item = io::Result<String>> + Unpin,
    B: Stream<Item = io::Result<String>> + Unpin,
{
    a.merge(b)
}

/// Persists, classifies and records every line of a diagnostic stream.
///
/// Each line is written and flushed to the sink before it is classified, so
/// the raw evidence survives a fatal classification error.
pub struct LogStreamWatcher<S, W> {
    lines: S,
    sink: W,
    metrics: Arc<RunMetrics>,
}

impl<S, W> LogStreamWatcher<S, W>
where
    S: Stream<Item = io::Result<String>> + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(lines: S, sink: W, metrics: Arc<RunMetrics>) -> Self {
        Self {
            lines,
            sink,
            metrics,
        }
    }

    /// Run until the stream closes.
    ///
    /// A read error on the stream (broken pipe) ends the watcher normally.
    pub async fn run(mut self) -> Result<WatchSummary, WatchError> {
        let mut summary = WatchSummary::default();

        while let Some(next) = self.lines.next().await {
            let line = match next {
                Ok(line) => line,
                Err(e) => {
                    warn!("Diagnostic stream read failed, stopping log watcher: {e}");
                    break;
                }
            };
            summary.lines_seen += 1;

            self.persist(&line).await?;

            let events = classify(&line).inspect_err(|e| {
                error!("Log line violates the expected format: {e}");
            })?;

            let elapsed = self.metrics.elapsed();
            for event in &events {
                log_event(event, elapsed.as_secs_f64());
                self.metrics.record(event, elapsed);
                summary.events_recorded += 1;
            }
        }

        self.sink.flush().await.map_err(WatchError::Sink)?;
        debug!(
            "Log watcher finished: {} lines, {} events",
            summary.lines_seen, summary.events_recorded
        );
        Ok(summary)
    }

    async fn persist(&mut self, line: &str) -> Result<(), WatchError> {
        self.sink
            .write_all(line.as_bytes())
            .await
            .map_err(WatchError::Sink)?;
        self.sink.write_all(b"\n").await.map_err(WatchError::Sink)?;
        self.sink.flush().await.map_err(WatchError::Sink)
    }
}

fn log_event(event: &Event, elapsed_secs: f64) {
    match event {
        Event::ShardScaleUp { .. } | Event::RouterShardInsert { .. } => {
            info!("{event} at {elapsed_secs:.2}s");
        }
        Event::SlowLockAcquisition => debug!("{event} at {elapsed_secs:.2}s"),
        Event::Warning | Event::Error => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run_metrics::ShardCountSource;

    fn lines(input: &[&str]) -> impl Stream<Item = io::Result<String>> + Unpin {
        tokio_stream::iter(
            input
                .iter()
                .map(|l| Ok(l.to_string()))
                .collect::<Vec<io::Result<String>>>(),
        )
    }

    #[tokio::test]
    async fn test_watcher_records_events_and_persists_lines() {
        let metrics = Arc::new(RunMetrics::new());
        let mut sink = Vec::new();
        let watcher = LogStreamWatcher::new(
            lines(&[
                "2024 WARN x",
                "2024 ERROR y",
                "2024 INFO successfully scaled up number of shards to 3",
            ]),
            &mut sink,
            Arc::clone(&metrics),
        );

        let summary = watcher.run().await.unwrap();
        assert_eq!(summary.lines_seen, 3);
        assert_eq!(summary.events_recorded, 3);

        let log = metrics.summary();
        assert_eq!(log.warn_count, 1);
        assert_eq!(log.error_count, 1);
        assert_eq!(log.shard_scale_up.len(), 1);
        assert_eq!(log.shard_scale_up[0].shards, 3);
        assert!(log.shard_scale_up[0].elapsed_secs >= 0.0);

        assert_eq!(
            String::from_utf8(sink).unwrap(),
            "2024 WARN x\n2024 ERROR y\n2024 INFO successfully scaled up number of shards to 3\n"
        );
    }

    #[tokio::test]
    async fn test_malformed_line_is_persisted_before_failing() {
        let metrics = Arc::new(RunMetrics::new());
        let mut sink = Vec::new();
        let watcher = LogStreamWatcher::new(
            lines(&[
                "INFO inserted 2 shards into routing table",
                "INFO successfully scaled up number of shards to",
                "INFO never reached",
            ]),
            &mut sink,
            Arc::clone(&metrics),
        );

        let err = watcher.run().await.unwrap_err();
        assert!(matches!(
            err,
            WatchError::Classify(ClassifyError::MalformedShardScaleUp { .. })
        ));
        assert_eq!(metrics.shards_in_router(), 3);

        let persisted = String::from_utf8(sink).unwrap();
        assert!(persisted.ends_with("INFO successfully scaled up number of shards to\n"));
        assert!(!persisted.contains("never reached"));
    }

    #[tokio::test]
    async fn test_read_error_ends_watcher_normally() {
        let metrics = Arc::new(RunMetrics::new());
        let stream = tokio_stream::iter(vec![
            Ok("WARN before".to_string()),
            Err(io::Error::from(io::ErrorKind::BrokenPipe)),
            Ok("WARN after".to_string()),
        ]);
        let summary = LogStreamWatcher::new(stream, tokio::io::sink(), Arc::clone(&metrics))
            .run()
            .await
            .unwrap();
        assert_eq!(summary.lines_seen, 1);
        assert_eq!(metrics.warn_count(), 1);
    }

    #[tokio::test]
    async fn test_line_stream_splits_and_decodes() {
        let input: &[u8] = b"first\r\nsecond\n\xffbad\nlast-without-newline";
        let collected: Vec<String> = line_stream(input)
            .map(|l| l.unwrap())
            .collect()
            .await;
        assert_eq!(
            collected,
            vec![
                "first".to_string(),
                "second".to_string(),
                "\u{fffd}bad".to_string(),
                "last-without-newline".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_line_stream_joins_partial_reads_and_strips_cr() {
        let pipe = tokio_test::io::Builder::new()
            .read(b"2024 WARN par")
            .read(b"tial\r")
            .read(b"\n2024 INFO next\n")
            .build();
        let collected: Vec<String> = line_stream(pipe).map(|l| l.unwrap()).collect().await;
        assert_eq!(collected, vec!["2024 WARN partial", "2024 INFO next"]);
    }

    #[tokio::test]
    async fn test_merge_lines_keeps_every_line() {
        let stdout: &[u8] = b"a1\na2\n";
        let stderr: &[u8] = b"b1\n";
        let mut merged: Vec<String> = merge_lines(line_stream(stdout), line_stream(stderr))
            .map(|l| l.unwrap())
            .collect()
            .await;
        merged.sort();
        assert_eq!(merged, vec!["a1", "a2", "b1"]);
    }
}
