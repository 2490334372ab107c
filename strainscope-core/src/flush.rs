//! Durable flush path
//!
//! Accepted readings are copied into a pending queue as well as into their
//! ring. The ring serves readers; the pending queue feeds the
//! [`DurableSink`]. The two are independent: flushing never removes anything
//! from a ring, and a failing sink never blocks ingestion.
//!
//! ## Batching
//!
//! A batch is cut when either condition holds, whichever comes first:
//! - `flush_interval` has elapsed since the worker last woke
//! - the pending count reached `flush_threshold` (ingest wakes the worker)
//!
//! ```text
//! ingest ──► ring (serving)
//!    │
//!    └────► pending ──► [worker] ──► sink.persist(batch, timeout)
//!                          ▲                │
//!                          └── retained ◄───┘ on Err
//! ```
//!
//! On failure the batch is put back at the front of the queue and the worker
//! backs off: threshold wake-ups are ignored and the next attempt comes one
//! full `flush_interval` later. A successful flush ends the back-off. The queue is bounded by `max_pending`; beyond it the
//! oldest readings are dropped and counted.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use parking_lot::{Condvar, Mutex};

use crate::errors::{CoreError, CoreResult, FlushError, SinkError};
use crate::reading::Reading;
use crate::traits::DurableSink;

/// Bounded queue of readings not yet durably written
#[derive(Debug)]
pub struct PendingQueue {
    readings: Mutex<VecDeque<Reading>>,
    max_pending: usize,
    dropped: AtomicU64,
}

impl PendingQueue {
    pub fn new(max_pending: usize) -> Self {
        Self {
            readings: Mutex::new(VecDeque::new()),
            max_pending: max_pending.max(1),
            dropped: AtomicU64::new(0),
        }
    }

    /// Queue one reading, returns the pending count afterwards
    pub fn push(&self, reading: Reading) -> usize {
        let mut readings = self.readings.lock();
        readings.push_back(reading);
        let overflow = readings.len().saturating_sub(self.max_pending);
        if overflow > 0 {
            readings.drain(..overflow);
            self.note_dropped(overflow);
        }
        readings.len()
    }

    /// Take everything pending, oldest first
    pub fn take_all(&self) -> Vec<Reading> {
        let mut readings = self.readings.lock();
        readings.drain(..).collect()
    }

    /// Put a failed batch back in front of anything queued since
    pub fn restore(&self, batch: Vec<Reading>) {
        let mut readings = self.readings.lock();
        for reading in batch.into_iter().rev() {
            readings.push_front(reading);
        }
        let overflow = readings.len().saturating_sub(self.max_pending);
        if overflow > 0 {
            readings.drain(..overflow);
            self.note_dropped(overflow);
        }
    }

    pub fn len(&self) -> usize {
        self.readings.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.lock().is_empty()
    }

    /// Unflushed readings discarded because the queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn note_dropped(&self, count: usize) {
        self.dropped.fetch_add(count as u64, Ordering::Relaxed);
        warn!(
            "pending queue full ({} readings), dropped {} oldest unflushed",
            self.max_pending, count
        );
    }
}

#[derive(Debug, Default)]
struct WakeState {
    requested: bool,
    stopping: bool,
    // set by a failed flush, cleared by a successful one
    backing_off: bool,
}

/// Pending queue, sink and flush counters shared with the worker thread
pub(crate) struct Flusher {
    pending: PendingQueue,
    sink: Arc<dyn DurableSink>,
    threshold: usize,
    interval: Duration,
    timeout: Duration,
    // one flush at a time keeps retained batches in order
    in_flight: Mutex<()>,
    wake: Mutex<WakeState>,
    wake_cv: Condvar,
    flushed: AtomicU64,
    failures: AtomicU64,
}

impl Flusher {
    pub(crate) fn new(
        sink: Arc<dyn DurableSink>,
        threshold: usize,
        max_pending: usize,
        interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            pending: PendingQueue::new(max_pending),
            sink,
            threshold,
            interval,
            timeout,
            in_flight: Mutex::new(()),
            wake: Mutex::new(WakeState::default()),
            wake_cv: Condvar::new(),
            flushed: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Queue an accepted reading; wakes the worker at the threshold
    pub(crate) fn enqueue(&self, reading: Reading) {
        if self.pending.push(reading) >= self.threshold {
            self.request();
        }
    }

    fn request(&self) {
        let mut wake = self.wake.lock();
        if wake.backing_off {
            return;
        }
        wake.requested = true;
        self.wake_cv.notify_one();
    }

    /// Hand everything pending to the sink as one batch
    pub(crate) fn flush(&self) -> Result<usize, FlushError> {
        let _guard = self.in_flight.lock();

        let batch = self.pending.take_all();
        if batch.is_empty() {
            return Ok(0);
        }

        let batch_len = batch.len();
        match self.sink.persist(&batch, self.timeout) {
            Ok(()) => {
                self.wake.lock().backing_off = false;
                self.flushed.fetch_add(batch_len as u64, Ordering::Relaxed);
                debug!("flushed {} readings to {}", batch_len, self.sink.name());
                Ok(batch_len)
            }
            Err(source) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                self.pending.restore(batch);
                self.wake.lock().backing_off = true;
                let err = FlushError::Sink {
                    sink: self.sink.name(),
                    batch_len,
                    source,
                };
                warn!("{}; retained for retry", err);
                Err(err)
            }
        }
    }

    pub(crate) fn pending(&self) -> &PendingQueue {
        &self.pending
    }

    pub(crate) fn flushed(&self) -> u64 {
        self.flushed.load(Ordering::Relaxed)
    }

    pub(crate) fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub(crate) fn sink_name(&self) -> &'static str {
        self.sink.name()
    }

    #[cfg(test)]
    fn is_backing_off(&self) -> bool {
        self.wake.lock().backing_off
    }

    /// Worker body: sleep until interval, threshold, or stop
    ///
    /// After a failure only the interval or stop ends the sleep.
    fn run(&self) {
        loop {
            let stopping = {
                let mut wake = self.wake.lock();
                if wake.backing_off {
                    let retry_at = Instant::now() + self.interval;
                    while !wake.stopping {
                        if self.wake_cv.wait_until(&mut wake, retry_at).timed_out() {
                            break;
                        }
                    }
                } else if !wake.requested && !wake.stopping {
                    let _ = self.wake_cv.wait_for(&mut wake, self.interval);
                }
                wake.requested = false;
                wake.stopping
            };

            // failures are logged and retained inside flush()
            let _ = self.flush();

            if stopping {
                break;
            }
        }
    }
}

/// Handle to the background flush thread
pub(crate) struct FlushWorker {
    flusher: Arc<Flusher>,
    handle: Option<JoinHandle<()>>,
}

impl FlushWorker {
    pub(crate) fn spawn(flusher: Arc<Flusher>) -> CoreResult<Self> {
        let worker = Arc::clone(&flusher);
        let handle = thread::Builder::new()
            .name("strainscope-flush".to_string())
            .spawn(move || worker.run())
            .map_err(|e| CoreError::Worker(e.to_string()))?;

        info!(
            "flush worker started (sink {}, interval {:?}, threshold {})",
            flusher.sink_name(),
            flusher.interval,
            flusher.threshold
        );
        Ok(Self {
            flusher,
            handle: Some(handle),
        })
    }

    /// Signal stop and wait; the worker flushes once more on its way out
    pub(crate) fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        {
            let mut wake = self.flusher.wake.lock();
            wake.stopping = true;
            self.flusher.wake_cv.notify_one();
        }
        if handle.join().is_err() {
            warn!("flush worker panicked");
        }
        // let a restarted worker run again
        self.flusher.wake.lock().stopping = false;
        info!("flush worker stopped");
    }
}

impl Drop for FlushWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// In-process sink that records every batch
///
/// Useful for tests and for embedding the core without a datastore. Failure can
/// be switched on to exercise the retry path.
#[derive(Debug, Default)]
pub struct MemorySink {
    batches: Mutex<Vec<Vec<Reading>>>,
    failing: Mutex<Option<SinkError>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent persist fail with `error`
    pub fn fail_with(&self, error: SinkError) {
        *self.failing.lock() = Some(error);
    }

    /// Resume accepting batches
    pub fn recover(&self) {
        *self.failing.lock() = None;
    }

    /// Batches received so far, in order
    pub fn batches(&self) -> Vec<Vec<Reading>> {
        self.batches.lock().clone()
    }

    /// All persisted readings, flattened
    pub fn readings(&self) -> Vec<Reading> {
        self.batches.lock().iter().flatten().cloned().collect()
    }

    pub fn persisted_count(&self) -> usize {
        self.batches.lock().iter().map(Vec::len).sum()
    }
}

impl DurableSink for MemorySink {
    fn persist(&self, batch: &[Reading], _timeout: Duration) -> Result<(), SinkError> {
        if let Some(error) = self.failing.lock().clone() {
            return Err(error);
        }
        self.batches.lock().push(batch.to_vec());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(ts: u64) -> Reading {
        Reading::new("S", ts, ts as f64, 0, 50, 20.0)
    }

    fn flusher(sink: Arc<MemorySink>, threshold: usize, max_pending: usize) -> Flusher {
        Flusher::new(
            sink,
            threshold,
            max_pending,
            Duration::from_secs(3600),
            Duration::from_secs(1),
        )
    }

    #[test]
    fn pending_queue_drops_oldest() {
        let queue = PendingQueue::new(3);
        for ts in 1..=5 {
            queue.push(reading(ts));
        }
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.dropped(), 2);
        let timestamps: Vec<u64> = queue.take_all().iter().map(Reading::timestamp).collect();
        assert_eq!(timestamps, vec![3, 4, 5]);
        assert!(queue.is_empty());
    }

    #[test]
    fn restore_goes_in_front() {
        let queue = PendingQueue::new(10);
        queue.push(reading(1));
        queue.push(reading(2));
        let batch = queue.take_all();
        queue.push(reading(3));
        queue.restore(batch);
        let timestamps: Vec<u64> = queue.take_all().iter().map(Reading::timestamp).collect();
        assert_eq!(timestamps, vec![1, 2, 3]);
    }

    #[test]
    fn flush_hands_batch_to_sink() {
        let sink = Arc::new(MemorySink::new());
        let flusher = flusher(Arc::clone(&sink), 100, 1000);
        for ts in 1..=4 {
            flusher.enqueue(reading(ts));
        }
        assert_eq!(flusher.flush(), Ok(4));
        assert_eq!(sink.persisted_count(), 4);
        assert_eq!(flusher.flushed(), 4);
        assert_eq!(flusher.flush(), Ok(0));
        assert_eq!(sink.batches().len(), 1);
    }

    #[test]
    fn failed_batch_is_retained() {
        let sink = Arc::new(MemorySink::new());
        let flusher = flusher(Arc::clone(&sink), 100, 1000);
        flusher.enqueue(reading(1));
        sink.fail_with(SinkError::Unavailable("down".into()));

        let err = flusher.flush().unwrap_err();
        assert!(matches!(err, FlushError::Sink { batch_len: 1, .. }));
        assert_eq!(flusher.pending().len(), 1);
        assert_eq!(flusher.failures(), 1);
        assert!(flusher.is_backing_off());

        sink.recover();
        assert_eq!(flusher.flush(), Ok(1));
        assert!(flusher.pending().is_empty());
        assert!(!flusher.is_backing_off());
    }

    #[test]
    fn backing_off_ignores_threshold() {
        let sink = Arc::new(MemorySink::new());
        sink.fail_with(SinkError::Unavailable("down".into()));
        let flusher = Arc::new(flusher(Arc::clone(&sink), 2, 1000));
        let mut worker = FlushWorker::spawn(Arc::clone(&flusher)).unwrap();

        flusher.enqueue(reading(1));
        flusher.enqueue(reading(2));
        for _ in 0..200 {
            if flusher.failures() == 1 {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(flusher.failures(), 1);

        for ts in 3..=50 {
            flusher.enqueue(reading(ts));
        }
        thread::sleep(Duration::from_millis(50));
        assert_eq!(flusher.failures(), 1);

        sink.recover();
        worker.stop();
        assert_eq!(sink.persisted_count(), 50);
        assert!(!flusher.is_backing_off());
    }

    #[test]
    fn worker_flushes_on_threshold_and_stop() {
        let sink = Arc::new(MemorySink::new());
        let flusher = Arc::new(flusher(Arc::clone(&sink), 2, 1000));
        let mut worker = FlushWorker::spawn(Arc::clone(&flusher)).unwrap();

        flusher.enqueue(reading(1));
        flusher.enqueue(reading(2));
        for _ in 0..200 {
            if sink.persisted_count() == 2 {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(sink.persisted_count(), 2);

        flusher.enqueue(reading(3));
        worker.stop();
        assert_eq!(sink.persisted_count(), 3);
    }
}
