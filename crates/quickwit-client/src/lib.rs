//! Minimal client for the pieces of the Quickwit REST API a benchmark run
//! needs: the readiness probe and index creation.

pub mod client;
pub mod error;
pub mod index_config;

pub use client::{is_truthy, QuickwitClient, ReadinessOptions};
pub use error::{ClientError, ProbeError};
pub use index_config::{IndexConfig, INDEX_CONFIG_VERSION, TIMESTAMP_FIELD};
