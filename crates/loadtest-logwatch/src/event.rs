//! Classification of service log lines into structured events.
//!
//! A line yields at most two events: one severity (`Error` or `Warning`) and
//! one incident (slow lock, shard scale-up or routing-table insert). The two
//! checks are independent, so a `WARN` line announcing a scale-up produces
//! both facts.

use serde::{Deserialize, Serialize};
use thiserror::Error;

const ERROR_MARKER: &str = "ERROR";
const WARN_MARKER: &str = "WARN";
const SLOW_LOCK_PHRASE: &str = "lock acquisition took";
const SCALE_UP_PHRASE: &str = "successfully scaled up number of shards to";
const ROUTING_INSERT_PHRASE: &str = "shards into routing table";
const ROUTING_INSERT_VERB: &str = "inserted";

/// A fact extracted from a single log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    Warning,
    Error,
    SlowLockAcquisition,
    /// The ingest pipeline now runs `new_shard_count` shards.
    ShardScaleUp { new_shard_count: u64 },
    /// The router gained `shards_added` shards.
    RouterShardInsert { shards_added: u64 },
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Event::Warning => write!(f, "warning"),
            Event::Error => write!(f, "error"),
            Event::SlowLockAcquisition => write!(f, "slow lock acquisition"),
            Event::ShardScaleUp { new_shard_count } => {
                write!(f, "shard scale-up to {new_shard_count}")
            }
            Event::RouterShardInsert { shards_added } => {
                write!(f, "{shards_added} shards inserted into routing table")
            }
        }
    }
}

/// The line matched a shard phrase but its count could not be read.
///
/// This means the service's log format no longer matches what the harness
/// expects, so the run must stop.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassifyError {
    #[error("Malformed shard scale-up line (no shard count after phrase): {line}")]
    MalformedShardScaleUp { line: String },

    #[error("Malformed routing table line (no shard count before phrase): {line}")]
    MalformedRoutingInsert { line: String },
}

/// Classify one log line.
///
/// Pure function of the line content. Returns the severity event first (if
/// any), then the incident event (if any).
pub fn classify(line: &str) -> Result<Vec<Event>, ClassifyError> {
    let mut events = Vec::with_capacity(2);

    // ERROR wins over WARN; a line carries a single level in the service format.
    if line.contains(ERROR_MARKER) {
        events.push(Event::Error);
    } else if line.contains(WARN_MARKER) {
        events.push(Event::Warning);
    }

    if line.contains(SLOW_LOCK_PHRASE) {
        events.push(Event::SlowLockAcquisition);
    } else if let Some(pos) = line.find(SCALE_UP_PHRASE) {
        let rest = &line[pos + SCALE_UP_PHRASE.len()..];
        let new_shard_count = leading_number(rest.trim_start()).ok_or_else(|| {
            ClassifyError::MalformedShardScaleUp {
                line: line.to_string(),
            }
        })?;
        events.push(Event::ShardScaleUp { new_shard_count });
    } else if let Some(pos) = line.find(ROUTING_INSERT_PHRASE) {
        let shards_added = routing_insert_count(&line[..pos]).ok_or_else(|| {
            ClassifyError::MalformedRoutingInsert {
                line: line.to_string(),
            }
        })?;
        events.push(Event::RouterShardInsert { shards_added });
    }

    Ok(events)
}

/// Parse the run of ASCII digits at the start of `s`.
fn leading_number(s: &str) -> Option<u64> {
    let end = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    if end == 0 {
        return None;
    }
    s[..end].parse().ok()
}

/// Read `N` from the text preceding "shards into routing table", which must
/// end with "inserted N ".
fn routing_insert_count(prefix: &str) -> Option<u64> {
    let mut tokens = prefix.split_whitespace().rev();
    let count = tokens.next()?;
    if tokens.next()? != ROUTING_INSERT_VERB {
        return None;
    }
    if !count.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    count.parse().ok()
}
