//! Error Types for the Streaming Core
//!
//! ## Error Categories
//!
//! The core separates failures by who has to react to them:
//!
//! ### Data quality (never raised)
//! - `RejectReason`: why a reading was dropped at the ingestion boundary. Ingestion
//!   is a best-effort stream, so these are counted, logged at trace level, and
//!   returned only as `false` from `Aggregator::ingest`.
//!
//! ### Durable storage (recoverable)
//! - `SinkError`: returned by a `DurableSink` implementation.
//! - `FlushError`: what `Aggregator::flush_now` reports. The batch stays pending
//!   and is retried on the next interval.
//!
//! ### Programmer errors (fatal at construction)
//! - `CoreError::InvalidConfig`: capacity of zero, zero flush interval, etc. The
//!   core refuses to start rather than run with an invalid bound.
//!
//! Reading an unknown sensor is not an error at all: every query has a defined
//! empty result.
//!
//! ```rust
//! use strainscope_core::{Aggregator, AggregatorConfig, CoreError};
//!
//! let config = AggregatorConfig::default().with_capacity(0);
//! match Aggregator::new(config) {
//!     Err(CoreError::InvalidConfig { field, .. }) => assert_eq!(field, "capacity"),
//!     _ => unreachable!(),
//! }
//! ```

use thiserror::Error;

use crate::reading::IntegrityTag;

/// Result type for core configuration and control operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Fatal configuration and control errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// A configuration value would make the store unusable
    #[error("invalid configuration for {field}: {reason}")]
    InvalidConfig {
        /// Name of the offending setting
        field: &'static str,
        /// What is wrong with it
        reason: &'static str,
    },

    /// Sensor id was empty where one is required
    #[error("sensor id must not be empty")]
    EmptySensorId,

    /// Configuration document could not be parsed
    #[error("configuration parse error: {0}")]
    Parse(String),

    /// The flush worker thread could not be spawned
    #[error("failed to start flush worker: {0}")]
    Worker(String),
}

/// Why a reading was dropped at ingestion - kept small and `Copy`
/// since one is produced for every corrupt frame.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum RejectReason {
    /// Reading has no sensor id
    #[error("sensor id is empty")]
    EmptySensorId,

    /// Stored integrity tag does not match the recomputed one
    #[error("integrity tag mismatch: stored {stored}, computed {computed}")]
    IntegrityMismatch {
        /// Tag the reading arrived with
        stored: IntegrityTag,
        /// Tag recomputed from the reading's fields
        computed: IntegrityTag,
    },

    /// A bounded field is outside its valid range
    #[error("{field} {value} outside range [{min}, {max}]")]
    OutOfRange {
        /// Field name (`battery_percent` or `temperature_c`)
        field: &'static str,
        /// Offending value
        value: f64,
        /// Inclusive lower bound
        min: f64,
        /// Inclusive upper bound
        max: f64,
    },

    /// Strain value is NaN or infinite
    #[error("strain value is not a finite number")]
    InvalidValue,
}

/// Error reported by a durable-storage collaborator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SinkError {
    /// Storage backend is not reachable
    #[error("sink unavailable: {0}")]
    Unavailable(String),

    /// Backend did not answer within the flush timeout
    #[error("sink timed out after {0} ms")]
    Timeout(u64),

    /// Backend rejected or failed the write
    #[error("write failed: {0}")]
    Write(String),

    /// Batch could not be encoded for the backend
    #[error("serialization failed: {0}")]
    Serialization(String),
}

/// Outcome of a failed flush attempt
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FlushError {
    /// No sink is attached to the aggregator
    #[error("no durable sink configured")]
    NoSink,

    /// Sink failed; the batch remains pending
    #[error("{sink} failed to persist {batch_len} readings: {source}")]
    Sink {
        /// Sink name, for logs
        sink: &'static str,
        /// Size of the batch that was retained
        batch_len: usize,
        /// Underlying sink failure
        #[source]
        source: SinkError,
    },
}

/// Export projection failures
#[cfg(feature = "export")]
#[derive(Error, Debug)]
pub enum ExportError {
    /// Format name not recognised
    #[error("unsupported export format: {0}")]
    UnsupportedFormat(String),

    /// CSV encoding failed
    #[error("csv export failed: {0}")]
    Csv(#[from] csv::Error),

    /// JSON encoding failed
    #[error("json export failed: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reject_reason_display() {
        let reason = RejectReason::OutOfRange {
            field: "battery_percent",
            value: 120.0,
            min: 0.0,
            max: 100.0,
        };
        assert_eq!(reason.to_string(), "battery_percent 120 outside range [0, 100]");

        let reason = RejectReason::IntegrityMismatch {
            stored: IntegrityTag::from_raw(0xdead_beef),
            computed: IntegrityTag::from_raw(0x0000_0001),
        };
        assert_eq!(
            reason.to_string(),
            "integrity tag mismatch: stored deadbeef, computed 00000001"
        );
    }

    #[test]
    fn flush_error_keeps_source() {
        use std::error::Error as _;

        let err = FlushError::Sink {
            sink: "memory",
            batch_len: 3,
            source: SinkError::Timeout(250),
        };
        assert_eq!(err.to_string(), "memory failed to persist 3 readings: sink timed out after 250 ms");
        assert!(err.source().is_some());
    }
}
