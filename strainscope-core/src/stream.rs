//! One sensor's stream: ring plus index behind a single lock
//!
//! The ring and its index must change together. Both live in one
//! [`parking_lot::RwLock`], so a reader sees either the state before an append
//! (eviction and stats both untouched) or after it, never a mix.
//!
//! Readers hold the read lock only while copying out. Decimation, formatting
//! and filtering happen on the copy, after the guard is dropped.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::buffer::RingBuffer;
use crate::index::{StreamIndex, StreamStats};
use crate::reading::Reading;

#[derive(Debug)]
struct StreamState {
    ring: RingBuffer,
    index: StreamIndex,
}

/// Bounded history and running stats for one sensor
#[derive(Debug)]
pub struct SensorStream {
    sensor_id: Arc<str>,
    state: RwLock<StreamState>,
}

impl SensorStream {
    pub fn new(sensor_id: Arc<str>, capacity: usize) -> Self {
        Self {
            sensor_id,
            state: RwLock::new(StreamState {
                ring: RingBuffer::new(capacity),
                index: StreamIndex::new(),
            }),
        }
    }

    pub fn sensor_id(&self) -> &str {
        &self.sensor_id
    }

    /// Append then index, atomically with respect to readers
    ///
    /// Returns the evicted reading, if any.
    pub fn append(&self, reading: Reading) -> Option<Reading> {
        let mut state = self.state.write();
        let StreamState { ring, index } = &mut *state;

        let evicted = ring.push(reading);
        if let Some(appended) = ring.last() {
            index.on_append(appended, evicted.as_ref(), ring);
        }
        evicted
    }

    /// Ordered copy of resident readings
    pub fn snapshot(&self) -> Vec<Reading> {
        self.state.read().ring.snapshot()
    }

    pub fn latest(&self) -> Option<Reading> {
        self.state.read().ring.last().cloned()
    }

    pub fn stats(&self) -> StreamStats {
        let state = self.state.read();
        state.index.stats(&state.ring)
    }

    /// Snapshot and stats taken under one guard
    pub fn snapshot_with_stats(&self) -> (Vec<Reading>, StreamStats) {
        let state = self.state.read();
        (state.ring.snapshot(), state.index.stats(&state.ring))
    }

    /// Copy out a projection of resident readings under the read lock
    ///
    /// `f` runs while the lock is held; keep it to a copy.
    pub fn collect<T>(&self, f: impl FnMut(&Reading) -> Option<T>) -> Vec<T> {
        let state = self.state.read();
        state.ring.iter().filter_map(f).collect()
    }

    pub fn len(&self) -> usize {
        self.state.read().ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().ring.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.state.read().ring.capacity()
    }

    /// Readings ever appended, including evicted ones
    pub fn total_appended(&self) -> u64 {
        self.state.read().index.total_appended()
    }

    /// Empty contents, keep identity
    pub fn clear(&self) {
        let mut state = self.state.write();
        state.ring.clear();
        state.index.reset();
    }

    /// Change ring capacity, keeping the newest readings
    ///
    /// Returns how many readings were dropped.
    pub fn resize(&self, capacity: usize) -> usize {
        let mut state = self.state.write();
        let StreamState { ring, index } = &mut *state;

        let dropped = ring.resize(capacity);
        index.resync(ring);
        dropped.len()
    }
}
