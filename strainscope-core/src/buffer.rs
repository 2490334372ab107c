//! Fixed-Capacity Ring Buffer for Per-Sensor History
//!
//! ## Overview
//!
//! Every sensor stream keeps its recent history in a [`RingBuffer`]: a circular
//! array with a capacity chosen at construction. When full, a push overwrites
//! the oldest reading and hands it back to the caller so derived statistics can
//! retract its contribution.
//!
//! - O(1) insertion (evicts oldest when full)
//! - O(1) access to most recent reading
//! - O(n) ordered copy for snapshots
//! - One allocation at construction, none on the hot path
//!
//! ### Memory Layout
//!
//! ```text
//! RingBuffer, capacity 5, after 7 pushes (A..G):
//! ┌─────┬─────┬─────┬─────┬─────┐
//! │  F  │  G  │  C  │  D  │  E  │  ← physical slots
//! └─────┴─────┴─────┴─────┴─────┘
//!                ↑
//!                write_pos = 2 (oldest resident, next overwrite)
//!
//! Logical view: [C, D, E, F, G]
//! ```
//!
//! ## Ordering
//!
//! Readings are kept in arrival order. Producer timestamps may go backwards;
//! the buffer never sorts.
//!
//! ## Thread Safety
//!
//! Not thread-safe on its own. `SensorStream` wraps it together with its
//! index in a single `RwLock`.
//!
//! ```rust
//! use strainscope_core::buffer::RingBuffer;
//! use strainscope_core::Reading;
//!
//! let mut ring = RingBuffer::new(2);
//! assert!(ring.push(Reading::new("S", 100, 1.0, 0, 90, 20.0)).is_none());
//! assert!(ring.push(Reading::new("S", 200, 2.0, 0, 90, 20.0)).is_none());
//!
//! let evicted = ring.push(Reading::new("S", 300, 3.0, 0, 90, 20.0));
//! assert_eq!(evicted.map(|r| r.timestamp()), Some(100));
//! ```

use crate::reading::Reading;

/// Fixed-capacity FIFO ring of readings
///
/// ## Internal Invariants
///
/// - `slots.len() == capacity`
/// - `write_pos < capacity`
/// - `len <= capacity`
/// - when `len < capacity`, resident readings occupy slots `0..len`
/// - when full, the oldest reading sits at `write_pos`
#[derive(Debug, Clone)]
pub struct RingBuffer {
    slots: Vec<Option<Reading>>,
    write_pos: usize,
    len: usize,
}

impl RingBuffer {
    /// Creates an empty ring
    ///
    /// `capacity` must be non-zero; the aggregator validates this before any
    /// ring is built. A zero capacity is bumped to one rather than producing a
    /// ring that can never hold data.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: vec![None; capacity],
            write_pos: 0,
            len: 0,
        }
    }

    /// Adds a reading at the tail
    ///
    /// Returns the evicted head when the ring was already full.
    pub fn push(&mut self, reading: Reading) -> Option<Reading> {
        let capacity = self.capacity();
        let evicted = self.slots[self.write_pos].replace(reading);
        self.write_pos = (self.write_pos + 1) % capacity;

        if self.len < capacity {
            self.len += 1;
            None
        } else {
            evicted
        }
    }

    /// Maximum number of readings held
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of resident readings
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// Most recent reading
    pub fn last(&self) -> Option<&Reading> {
        if self.is_empty() {
            return None;
        }

        let capacity = self.capacity();
        let idx = (self.write_pos + capacity - 1) % capacity;
        self.slots[idx].as_ref()
    }

    /// Oldest resident reading
    pub fn first(&self) -> Option<&Reading> {
        self.get(0)
    }

    /// Reading by logical index (0 = oldest, len-1 = newest)
    ///
    /// ```text
    /// Physical:  [D, E, A, B, C]  (write_pos = 2, full)
    /// Logical:   [A, B, C, D, E]
    /// logical[i] = physical[(write_pos + i) % capacity]
    /// ```
    pub fn get(&self, index: usize) -> Option<&Reading> {
        if index >= self.len {
            return None;
        }

        let actual_index = if self.len < self.capacity() {
            index
        } else {
            (self.write_pos + index) % self.capacity()
        };

        self.slots[actual_index].as_ref()
    }

    /// Iterate from oldest to newest
    pub fn iter(&self) -> RingIter<'_> {
        RingIter {
            ring: self,
            index: 0,
        }
    }

    /// Point-in-time copy, oldest to newest
    pub fn snapshot(&self) -> Vec<Reading> {
        let mut out = Vec::with_capacity(self.len);
        out.extend(self.iter().cloned());
        out
    }

    /// Empties the ring in place, keeping its capacity
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
        self.write_pos = 0;
        self.len = 0;
    }

    /// Change capacity, keeping the newest `min(len, capacity)` readings
    ///
    /// Returns the readings dropped from the head, oldest first.
    pub fn resize(&mut self, capacity: usize) -> Vec<Reading> {
        let capacity = capacity.max(1);
        let mut resident = self.snapshot();
        let dropped_count = resident.len().saturating_sub(capacity);
        let dropped: Vec<Reading> = resident.drain(..dropped_count).collect();

        self.slots = vec![None; capacity];
        self.write_pos = 0;
        self.len = 0;
        for reading in resident {
            self.push(reading);
        }

        dropped
    }
}

/// Iterator over ring contents in arrival order
pub struct RingIter<'a> {
    ring: &'a RingBuffer,
    index: usize,
}

impl<'a> Iterator for RingIter<'a> {
    type Item = &'a Reading;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.ring.get(self.index)?;
        self.index += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.ring.len().saturating_sub(self.index);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for RingIter<'_> {}
