//! Durable-Storage Sinks for the StrainScope Flush Worker
//!
//! ## Overview
//!
//! The streaming core keeps recent history in memory and periodically hands
//! batches of accepted readings to a [`DurableSink`]. This crate provides the
//! sinks used in deployment. Each one persists a whole batch or reports
//! failure; the aggregator keeps failed batches and retries them, so a sink
//! never needs its own retry queue.
//!
//! ## Sink Selection Guide
//!
//! ### JSON lines (always available)
//!
//! **When to use:**
//! - Single node, local disk
//! - Logs shipped elsewhere by an external agent
//! - Debugging a field unit
//!
//! One JSON object per reading, appended and synced per batch.
//!
//! ### SQLite (`sqlite` feature, default)
//!
//! **When to use:**
//! - Local history that must survive restarts
//! - Ad-hoc SQL against past readings
//!
//! Writes the `strain_readings` table, one transaction per batch, so a batch
//! lands completely or not at all.
//!
//! ### HTTP (`http` feature)
//!
//! **When to use:**
//! - Central collection server
//! - Gateways with intermittent uplink
//!
//! POSTs `{ "count": n, "readings": [...] }` chunks. Server errors (5xx),
//! rate limiting (429) and transport failures are retried with backoff within
//! the flush timeout.
//!
//! ## Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use strainscope_connectors::JsonLinesSink;
//! use strainscope_core::{Aggregator, AggregatorConfig};
//!
//! let sink = Arc::new(JsonLinesSink::open("/var/lib/strainscope/readings.jsonl")?);
//! let aggregator = Aggregator::new(AggregatorConfig::default())?.with_sink(sink.clone());
//! aggregator.start()?;
//! // ... ingest ...
//! aggregator.stop();
//! println!("{} batches written", sink.stats().batches_sent);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod jsonl;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "http")]
pub mod http;

pub use jsonl::JsonLinesSink;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteSink;

#[cfg(feature = "http")]
pub use http::{HttpConfig, HttpError, HttpSink};

use parking_lot::Mutex;
use thiserror::Error;

pub use strainscope_core::{DurableSink, SinkError};

/// Common connector errors
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[cfg(feature = "sqlite")]
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Timeout after {0} ms")]
    Timeout(u64),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<ConnectorError> for SinkError {
    fn from(err: ConnectorError) -> Self {
        match err {
            ConnectorError::Io(e) => SinkError::Write(e.to_string()),
            ConnectorError::Serialization(e) => SinkError::Serialization(e.to_string()),
            #[cfg(feature = "sqlite")]
            ConnectorError::Database(e) => SinkError::Write(e.to_string()),
            ConnectorError::Timeout(ms) => SinkError::Timeout(ms),
            ConnectorError::ConfigError(msg) => SinkError::Unavailable(msg),
        }
    }
}

/// Delivery statistics common to all sinks
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ConnectionStats {
    /// Batches persisted successfully
    pub batches_sent: u64,
    /// Batches that failed
    pub batches_failed: u64,
    /// Readings persisted successfully
    pub readings_sent: u64,
    /// Bytes written or posted
    pub bytes_sent: u64,
    /// Retries performed inside persist calls
    pub retries: u32,
    /// Last error message
    pub last_error: Option<String>,
}

/// Shared stats cell used by every sink
#[derive(Debug, Default)]
pub(crate) struct StatsCell(Mutex<ConnectionStats>);

impl StatsCell {
    pub(crate) fn record_success(&self, readings: usize, bytes: usize) {
        let mut stats = self.0.lock();
        stats.batches_sent += 1;
        stats.readings_sent += readings as u64;
        stats.bytes_sent += bytes as u64;
    }

    pub(crate) fn record_failure(&self, error: &impl std::fmt::Display) {
        let mut stats = self.0.lock();
        stats.batches_failed += 1;
        stats.last_error = Some(error.to_string());
    }

    pub(crate) fn record_retry(&self) {
        self.0.lock().retries += 1;
    }

    pub(crate) fn snapshot(&self) -> ConnectionStats {
        self.0.lock().clone()
    }
}
