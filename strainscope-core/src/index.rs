//! Running statistics per sensor stream
//!
//! [`StreamIndex`] is updated on every append, in the same critical section as
//! the ring it describes. Count, running sum and latest reading are O(1) per
//! append. Min and max are recomputed over the resident ring when stats are
//! read: reads are far less frequent than writes in the oscilloscope workload
//! and the ring is bounded, so the rescan is cheap and always exact.
//!
//! The running sum subtracts evicted values, which accumulates floating-point
//! error over long runs. After every `capacity` evictions the sum is rebuilt
//! from the ring, amortising to O(1) per append.

use serde::{Deserialize, Serialize};

use crate::buffer::RingBuffer;
use crate::reading::Reading;
use crate::time::Timestamp;

/// Aggregates over the readings currently resident in one ring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamStats {
    /// Resident readings
    pub count: usize,
    pub min: f64,
    pub max: f64,
    /// Mean of resident values
    pub mean: f64,
    /// Timestamp of the most recently ingested reading
    pub latest_timestamp: Timestamp,
    pub latest_reading: Option<Reading>,
}

impl StreamStats {
    /// Stats of an empty stream
    pub fn empty() -> Self {
        Self {
            count: 0,
            min: 0.0,
            max: 0.0,
            mean: 0.0,
            latest_timestamp: 0,
            latest_reading: None,
        }
    }
}

/// Incrementally maintained aggregates for one ring
#[derive(Debug, Clone, Default)]
pub struct StreamIndex {
    count: usize,
    sum: f64,
    latest: Option<Reading>,
    evictions_since_resync: usize,
    total_appended: u64,
}

impl StreamIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an append that has already been applied to `ring`
    ///
    /// `evicted` is whatever the ring pushed out to make room.
    pub fn on_append(&mut self, appended: &Reading, evicted: Option<&Reading>, ring: &RingBuffer) {
        self.sum += appended.value();
        self.total_appended += 1;

        match evicted {
            Some(old) => {
                self.sum -= old.value();
                self.evictions_since_resync += 1;
                if self.evictions_since_resync >= ring.capacity() {
                    self.resync(ring);
                }
            }
            None => {
                self.count = (self.count + 1).min(ring.capacity());
            }
        }

        self.latest = Some(appended.clone());
    }

    /// Rebuild from the ring after a bulk change (clear, resize)
    pub fn resync(&mut self, ring: &RingBuffer) {
        self.count = ring.len();
        self.sum = ring.iter().map(Reading::value).sum();
        self.evictions_since_resync = 0;
        if ring.is_empty() {
            self.latest = None;
        }
    }

    /// Forget everything except the lifetime append counter
    pub fn reset(&mut self) {
        self.count = 0;
        self.sum = 0.0;
        self.latest = None;
        self.evictions_since_resync = 0;
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Readings ever appended to this stream, including evicted ones
    pub fn total_appended(&self) -> u64 {
        self.total_appended
    }

    pub fn latest(&self) -> Option<&Reading> {
        self.latest.as_ref()
    }

    /// Running mean of resident values
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    /// Full stats; min/max are a rescan of `ring`
    pub fn stats(&self, ring: &RingBuffer) -> StreamStats {
        let Some((min, max)) = value_bounds(ring.iter().map(Reading::value)) else {
            return StreamStats::empty();
        };

        StreamStats {
            count: self.count,
            min,
            max,
            mean: self.mean(),
            latest_timestamp: self.latest.as_ref().map_or(0, Reading::timestamp),
            latest_reading: self.latest.clone(),
        }
    }
}

/// Min and max of a value sequence, `None` when empty
pub fn value_bounds(values: impl IntoIterator<Item = f64>) -> Option<(f64, f64)> {
    values.into_iter().fold(None, |bounds, value| match bounds {
        None => Some((value, value)),
        Some((min, max)) => Some((min.min(value), max.max(value))),
    })
}
