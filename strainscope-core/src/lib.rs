//! Streaming core for StrainScope
//!
//! Keeps a bounded recent history per strain-gauge sensor in memory and serves
//! it as oscilloscope traces, point-in-time snapshots and incremental deltas,
//! while a background worker hands accepted readings to durable storage.
//!
//! Key constraints:
//! - Memory is bounded by ring capacity × sensor count, whatever the ingest rate
//! - Many concurrent producers and readers; no torn reads
//! - Bad readings are dropped and counted, never raised
//!
//! ```no_run
//! use std::sync::Arc;
//! use strainscope_core::{Aggregator, AggregatorConfig, MemorySink, Reading};
//!
//! let sink = Arc::new(MemorySink::new());
//! let aggregator = Aggregator::new(AggregatorConfig::default())?.with_sink(sink.clone());
//! aggregator.start()?;
//!
//! aggregator.ingest(Reading::new("SG-01", 1_700_000_000_000, 152.25, 81_234, 87, 23.5));
//!
//! let trace = aggregator.get_trace("SG-01", 500, 2);
//! let delta = aggregator.get_since("SG-01", 0);
//! println!("{} points, cursor {}", trace.point_count, delta.latest_millis);
//!
//! aggregator.stop();
//! # Ok::<(), strainscope_core::CoreError>(())
//! ```

#![deny(unsafe_code)]

pub mod aggregator;
pub mod buffer;
pub mod config;
pub mod cursor;
pub mod errors;
#[cfg(feature = "export")]
pub mod export;
pub mod flush;
pub mod index;
pub mod reading;
pub mod snapshot;
pub mod stream;
pub mod time;
pub mod trace;
pub mod traits;
pub mod validators;

// Public API
pub use aggregator::{Aggregator, IngestReport};
pub use config::AggregatorConfig;
pub use cursor::IncrementalResult;
pub use errors::{CoreError, CoreResult, FlushError, RejectReason, SinkError};
#[cfg(feature = "export")]
pub use errors::ExportError;
pub use flush::MemorySink;
pub use index::StreamStats;
pub use reading::{DataPoint, IntegrityTag, Reading, SensorConfiguration};
pub use snapshot::{PerformanceMetrics, RealtimeSnapshot, StreamSummary};
pub use time::{FixedTime, SystemTime, TimeSource, Timestamp};
pub use trace::{TraceQuery, TraceResult};
pub use traits::{DurableSink, Validator};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
