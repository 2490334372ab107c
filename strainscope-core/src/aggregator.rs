//! Aggregator - the single entry and exit point of the streaming core
//!
//! Owns the sensor-id → [`SensorStream`] map, validates readings at the
//! ingestion boundary, serves every read path and coordinates the durable
//! flush.
//!
//! ## Locking
//!
//! ```text
//! streams: RwLock<HashMap<id, Arc<SensorStream>>>
//!              │ clone Arc, release map lock
//!              ▼
//!          SensorStream: RwLock<{ ring, index }>
//! ```
//!
//! The map lock is only held to look up or insert an entry. All per-sensor work
//! happens under that sensor's own lock, so writers to different sensors never
//! contend and readers of one sensor never block writers of another.
//!
//! ## Example
//!
//! ```rust
//! use strainscope_core::{Aggregator, AggregatorConfig, Reading};
//!
//! let aggregator = Aggregator::new(AggregatorConfig::default().with_capacity(5))?;
//! for ts in [100, 200, 300, 400, 500, 600] {
//!     aggregator.ingest(Reading::new("S", ts, ts as f64, 0, 90, 20.0));
//! }
//!
//! let trace = aggregator.get_trace("S", 3, 1);
//! assert_eq!(trace.times, vec![400, 500, 600]);
//!
//! let delta = aggregator.get_since("S", 500);
//! assert_eq!(delta.new_points, 1);
//! assert_eq!(delta.latest_millis, 600);
//! # Ok::<(), strainscope_core::CoreError>(())
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{debug, trace};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::config::AggregatorConfig;
use crate::cursor::{is_newer, IncrementalResult};
use crate::errors::{CoreError, CoreResult, FlushError, RejectReason};
use crate::flush::{FlushWorker, Flusher};
use crate::index::StreamStats;
use crate::reading::Reading;
use crate::snapshot::{
    IngestCounters, MemoryUsage, PerformanceMetrics, RealtimeSnapshot, StreamSummary,
};
use crate::stream::SensorStream;
use crate::time::{SystemTime, TimeSource, Timestamp};
use crate::trace::{build_trace, TraceQuery, TraceResult};
use crate::traits::{DurableSink, Validator};
use crate::validators::ReadingValidator;

type BoxedValidator = Box<dyn Validator<Value = Reading> + Send + Sync>;

/// Outcome of [`Aggregator::ingest_batch`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub accepted: usize,
    pub rejected: usize,
}

impl IngestReport {
    pub fn total(&self) -> usize {
        self.accepted + self.rejected
    }
}

/// Ingestion counters, relaxed atomics
#[derive(Debug, Default)]
struct IngestStats {
    accepted: AtomicU64,
    rejected_empty_id: AtomicU64,
    rejected_integrity: AtomicU64,
    rejected_out_of_range: AtomicU64,
    rejected_invalid_value: AtomicU64,
}

impl IngestStats {
    fn reject(&self, reason: &RejectReason) {
        let counter = match reason {
            RejectReason::EmptySensorId => &self.rejected_empty_id,
            RejectReason::IntegrityMismatch { .. } => &self.rejected_integrity,
            RejectReason::OutOfRange { .. } => &self.rejected_out_of_range,
            RejectReason::InvalidValue => &self.rejected_invalid_value,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Multi-sensor ring store with trace, cursor and stats read paths
pub struct Aggregator {
    config: AggregatorConfig,
    streams: RwLock<HashMap<String, Arc<SensorStream>>>,
    validator: BoxedValidator,
    clock: Arc<dyn TimeSource>,
    flusher: Option<Arc<Flusher>>,
    worker: Mutex<Option<FlushWorker>>,
    stats: IngestStats,
}

impl Aggregator {
    /// Build an aggregator; invalid configuration is fatal here
    ///
    /// No sink is attached and no worker runs until [`with_sink`](Self::with_sink)
    /// and [`start`](Self::start) are called.
    pub fn new(config: AggregatorConfig) -> CoreResult<Self> {
        config.validate()?;

        Ok(Self {
            config,
            streams: RwLock::new(HashMap::new()),
            validator: Box::new(ReadingValidator::default()),
            clock: Arc::new(SystemTime),
            flusher: None,
            worker: Mutex::new(None),
            stats: IngestStats::default(),
        })
    }

    /// Attach the durable-storage collaborator
    ///
    /// Pending readings are flushed on [`stop`](Self::stop) and on drop, whether
    /// or not the worker was started.
    pub fn with_sink<S: DurableSink + 'static>(mut self, sink: S) -> Self {
        let flusher = Flusher::new(
            Arc::new(sink),
            self.config.flush_threshold,
            self.config.max_pending,
            self.config.flush_interval(),
            self.config.flush_timeout(),
        );
        self.flusher = Some(Arc::new(flusher));
        self
    }

    /// Replace the clock used for query metadata
    pub fn with_time_source(mut self, clock: Arc<dyn TimeSource>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the ingestion-boundary validator
    pub fn with_validator<V>(mut self, validator: V) -> Self
    where
        V: Validator<Value = Reading> + Send + Sync + 'static,
    {
        self.validator = Box::new(validator);
        self
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Spawn the background flush worker
    ///
    /// Without a sink this is a no-op. Calling it twice keeps the first worker.
    pub fn start(&self) -> CoreResult<()> {
        let Some(flusher) = &self.flusher else {
            debug!("no durable sink attached, flush worker not started");
            return Ok(());
        };

        let mut worker = self.worker.lock();
        if worker.is_none() {
            *worker = Some(FlushWorker::spawn(Arc::clone(flusher))?);
        }
        Ok(())
    }

    /// Stop the flush worker and perform a final flush
    ///
    /// Rings are untouched; reads keep working after `stop`.
    pub fn stop(&self) {
        let worker = self.worker.lock().take();
        match worker {
            // worker flushes once more on its way out
            Some(mut worker) => worker.stop(),
            None => {
                if let Some(flusher) = &self.flusher {
                    let _ = flusher.flush();
                }
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.lock().is_some()
    }

    // ---- ingestion ----

    /// Validate and append one reading
    ///
    /// Returns `false` if the reading was rejected. Rejections are counted by
    /// reason and never raised.
    pub fn ingest(&self, reading: Reading) -> bool {
        if let Err(reason) = self.validator.validate(&reading) {
            self.stats.reject(&reason);
            trace!("rejected reading from {:?}: {}", reading.sensor_id(), reason);
            return false;
        }

        let stream = self.stream_or_insert(reading.sensor_id(), None);
        if let Some(flusher) = &self.flusher {
            flusher.enqueue(reading.clone());
        }
        stream.append(reading);

        self.stats.accepted.fetch_add(1, Ordering::Relaxed);
        true
    }

    pub fn ingest_batch(&self, readings: impl IntoIterator<Item = Reading>) -> IngestReport {
        readings
            .into_iter()
            .fold(IngestReport::default(), |mut report, reading| {
                if self.ingest(reading) {
                    report.accepted += 1;
                } else {
                    report.rejected += 1;
                }
                report
            })
    }

    /// Set one sensor's ring capacity, creating the stream if needed
    ///
    /// Shrinking keeps the newest readings.
    pub fn configure_capacity(&self, sensor_id: &str, capacity: usize) -> CoreResult<()> {
        if capacity == 0 {
            return Err(CoreError::InvalidConfig {
                field: "capacity",
                reason: "must be at least 1",
            });
        }
        if sensor_id.is_empty() {
            return Err(CoreError::EmptySensorId);
        }

        let stream = self.stream_or_insert(sensor_id, Some(capacity));
        if stream.capacity() != capacity {
            let dropped = stream.resize(capacity);
            debug!(
                "sensor {} resized to {} readings ({} dropped)",
                sensor_id, capacity, dropped
            );
        }
        Ok(())
    }

    // ---- reads ----

    /// Ordered copy of a sensor's resident readings; empty if unknown
    pub fn snapshot(&self, sensor_id: &str) -> Vec<Reading> {
        self.stream(sensor_id)
            .map(|stream| stream.snapshot())
            .unwrap_or_default()
    }

    pub fn latest(&self, sensor_id: &str) -> Option<Reading> {
        self.stream(sensor_id)?.latest()
    }

    /// `None` for a sensor never seen; empty stats for a cleared one
    pub fn stats(&self, sensor_id: &str) -> Option<StreamStats> {
        self.stream(sensor_id).map(|stream| stream.stats())
    }

    /// Decimated, bounded trace for plotting
    ///
    /// `max_points == 0` means no limit; `decimation` of 0 or 1 means none.
    pub fn get_trace(&self, sensor_id: &str, max_points: usize, decimation: usize) -> TraceResult {
        let now = self.clock.now();
        let Some(stream) = self.stream(sensor_id) else {
            return TraceResult::empty(sensor_id, now);
        };

        let samples = stream.collect(|r| Some((r.timestamp(), r.value())));
        build_trace(sensor_id, samples, TraceQuery::new(max_points, decimation), now)
    }

    /// Independent traces for several sensors
    ///
    /// Each trace is consistent on its own; there is no cross-sensor snapshot.
    pub fn get_multi_trace<S: AsRef<str>>(
        &self,
        sensor_ids: &[S],
        max_points: usize,
        decimation: usize,
    ) -> BTreeMap<String, TraceResult> {
        sensor_ids
            .iter()
            .map(|id| {
                let id = id.as_ref();
                (id.to_string(), self.get_trace(id, max_points, decimation))
            })
            .collect()
    }

    /// Resident readings strictly newer than `since_millis`
    pub fn get_since(&self, sensor_id: &str, since_millis: Timestamp) -> IncrementalResult {
        let Some(stream) = self.stream(sensor_id) else {
            return IncrementalResult::empty(sensor_id, since_millis);
        };

        let points = stream.collect(|r| is_newer(r.timestamp(), since_millis).then(|| r.to_point()));
        IncrementalResult::from_points(sensor_id, since_millis, points)
    }

    /// Sorted ids of sensors with resident readings
    pub fn active_sensor_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .streams
            .read()
            .iter()
            .filter(|(_, stream)| !stream.is_empty())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Sorted ids of every known sensor, including cleared ones
    pub fn sensor_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.streams.read().keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    /// Latest values and aggregates for every active sensor
    pub fn realtime_snapshot(&self) -> RealtimeSnapshot {
        RealtimeSnapshot::from_stats(self.clock.now(), self.all_stats())
    }

    pub fn stream_summary(&self) -> StreamSummary {
        StreamSummary::from_stats(self.all_stats())
    }

    pub fn metrics(&self) -> PerformanceMetrics {
        let summary = self.stream_summary();
        let memory_usage = MemoryUsage::from_summary(&summary);

        let (flushed, flush_failures, dropped_unflushed, pending_flush) = match &self.flusher {
            Some(flusher) => (
                flusher.flushed(),
                flusher.failures(),
                flusher.pending().dropped(),
                flusher.pending().len(),
            ),
            None => (0, 0, 0, 0),
        };

        let ingest = IngestCounters {
            accepted: self.stats.accepted.load(Ordering::Relaxed),
            rejected_empty_id: self.stats.rejected_empty_id.load(Ordering::Relaxed),
            rejected_integrity: self.stats.rejected_integrity.load(Ordering::Relaxed),
            rejected_out_of_range: self.stats.rejected_out_of_range.load(Ordering::Relaxed),
            rejected_invalid_value: self.stats.rejected_invalid_value.load(Ordering::Relaxed),
            flushed,
            flush_failures,
            dropped_unflushed,
        };

        PerformanceMetrics {
            stream_stats: summary,
            ingest,
            pending_flush,
            memory_usage,
            config: self.config.clone(),
        }
    }

    // ---- flush and lifecycle ----

    /// Hand all pending readings to the sink now
    ///
    /// Returns the batch size. On failure the batch stays pending.
    pub fn flush_now(&self) -> Result<usize, FlushError> {
        self.flusher.as_ref().ok_or(FlushError::NoSink)?.flush()
    }

    /// Empty one sensor's ring, keeping the sensor known
    pub fn clear(&self, sensor_id: &str) {
        if let Some(stream) = self.stream(sensor_id) {
            stream.clear();
        }
    }

    pub fn clear_all(&self) {
        for stream in self.streams() {
            stream.clear();
        }
    }

    fn stream(&self, sensor_id: &str) -> Option<Arc<SensorStream>> {
        self.streams.read().get(sensor_id).cloned()
    }

    fn streams(&self) -> Vec<Arc<SensorStream>> {
        self.streams.read().values().cloned().collect()
    }

    fn all_stats(&self) -> Vec<(String, StreamStats)> {
        self.streams()
            .into_iter()
            .map(|stream| (stream.sensor_id().to_string(), stream.stats()))
            .collect()
    }

    /// Look up a stream, creating it on first sight
    ///
    /// The new stream is allocated before the write lock is taken; if another
    /// thread won the race its stream is kept and ours is discarded.
    fn stream_or_insert(&self, sensor_id: &str, capacity: Option<usize>) -> Arc<SensorStream> {
        if let Some(stream) = self.stream(sensor_id) {
            return stream;
        }

        let capacity = capacity.unwrap_or(self.config.capacity);
        let fresh = Arc::new(SensorStream::new(Arc::from(sensor_id), capacity));

        let mut streams = self.streams.write();
        let stream = streams
            .entry(sensor_id.to_string())
            .or_insert_with(|| {
                debug!("new sensor stream {} (capacity {})", sensor_id, capacity);
                fresh
            })
            .clone();
        stream
    }
}

impl Drop for Aggregator {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregator")
            .field("config", &self.config)
            .field("sensors", &self.streams.read().len())
            .field("running", &self.is_running())
            .finish()
    }
}
