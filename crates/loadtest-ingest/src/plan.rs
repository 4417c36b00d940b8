//! Open-loop pacing arithmetic.
//!
//! The interval between dispatches is fixed up front from the payload size
//! and the target byte rate. Observed latency and backpressure do not feed
//! back into it.

use crate::error::IngestError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bytes per mebibyte.
pub const MIB: u64 = 1024 * 1024;

/// Fixed dispatch schedule for one run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoadPlan {
    /// Serialized size of one request body (`L`).
    pub payload_bytes: u64,
    /// Target throughput in bytes per second.
    pub byte_rate: f64,
    /// Total bytes the run may send.
    pub total_bytes: u64,
    /// Time between dispatches, `L / byte_rate`.
    pub interval: Duration,
    /// Number of requests, `floor(total_bytes / L)`.
    pub iterations: u64,
}

impl LoadPlan {
    pub fn new(payload_bytes: u64, byte_rate: f64, total_bytes: u64) -> Result<Self, IngestError> {
        if payload_bytes == 0 {
            return Err(IngestError::InvalidPlan(
                "payload must not be empty".to_string(),
            ));
        }
        if !byte_rate.is_finite() || byte_rate <= 0.0 {
            return Err(IngestError::InvalidPlan(format!(
                "byte rate must be a positive number, got {byte_rate}"
            )));
        }

        let interval = Duration::try_from_secs_f64(payload_bytes as f64 / byte_rate)
            .map_err(|e| IngestError::InvalidPlan(format!("dispatch interval out of range: {e}")))?;

        Ok(Self {
            payload_bytes,
            byte_rate,
            total_bytes,
            interval,
            iterations: total_bytes / payload_bytes,
        })
    }

    /// Build a plan from MiB/s and MiB figures.
    pub fn from_mib(payload_bytes: u64, rate_mib: f64, total_mib: f64) -> Result<Self, IngestError> {
        if !total_mib.is_finite() || total_mib < 0.0 {
            return Err(IngestError::InvalidPlan(format!(
                "total budget must be a non-negative number, got {total_mib}"
            )));
        }
        let total_bytes = (total_mib * MIB as f64).floor() as u64;
        Self::new(payload_bytes, rate_mib * MIB as f64, total_bytes)
    }

    /// Offset from the run start at which dispatch `index` is due.
    pub fn dispatch_offset(&self, index: u64) -> Duration {
        Duration::try_from_secs_f64(self.interval.as_secs_f64() * index as f64)
            .unwrap_or(Duration::MAX)
    }

    /// Expected wall time of the full schedule.
    pub fn expected_duration(&self) -> Duration {
        self.dispatch_offset(self.iterations)
    }
}
