//! Time management for the streaming core
//!
//! Readings carry producer-assigned timestamps. The core itself only needs a
//! clock for query metadata (`last_update_millis`, snapshot timestamps) and for
//! flush scheduling, so the source is abstracted:
//! - System clock (production)
//! - Fixed clock that tests can set and advance

use std::sync::atomic::{AtomicU64, Ordering};

/// Timestamp in milliseconds since the Unix epoch
pub type Timestamp = u64;

/// Source of time for the system
pub trait TimeSource: Send + Sync {
    /// Get current timestamp in milliseconds
    fn now(&self) -> Timestamp;

    /// Check if this source provides wall clock time (vs fixed/simulated)
    fn is_wall_clock(&self) -> bool;
}

/// System wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTime;

impl TimeSource for SystemTime {
    fn now(&self) -> Timestamp {
        use std::time::{SystemTime as StdSystemTime, UNIX_EPOCH};

        StdSystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as Timestamp
    }

    fn is_wall_clock(&self) -> bool {
        true
    }
}

/// Fixed time source for testing
///
/// Interior mutability lets a test keep an `Arc<FixedTime>` and move the clock
/// while an aggregator holds another handle to it.
#[derive(Debug, Default)]
pub struct FixedTime {
    timestamp: AtomicU64,
}

impl FixedTime {
    pub fn new(timestamp: Timestamp) -> Self {
        Self {
            timestamp: AtomicU64::new(timestamp),
        }
    }

    pub fn set(&self, timestamp: Timestamp) {
        self.timestamp.store(timestamp, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: u64) {
        self.timestamp.fetch_add(ms, Ordering::SeqCst);
    }
}

impl TimeSource for FixedTime {
    fn now(&self) -> Timestamp {
        self.timestamp.load(Ordering::SeqCst)
    }

    fn is_wall_clock(&self) -> bool {
        false
    }
}

/// Span between two timestamps in seconds
///
/// Signed: arrival order is not timestamp order, so `last` may precede `first`.
pub fn span_seconds(first: Timestamp, last: Timestamp) -> f64 {
    (last as f64 - first as f64) / 1000.0
}
