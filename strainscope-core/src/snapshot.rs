//! Dashboard views across all sensors
//!
//! These are read-only projections assembled from per-sensor [`StreamStats`].
//! Each sensor's entry is internally consistent; entries for different sensors
//! may come from slightly different instants, since there is no cross-sensor
//! lock.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::AggregatorConfig;
use crate::index::StreamStats;
use crate::time::Timestamp;

/// Rough per-point footprint used by [`MemoryUsage`]
pub const ESTIMATED_BYTES_PER_POINT: usize = 32;

/// Latest values plus aggregates for one sensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSnapshot {
    pub current_value: f64,
    pub timestamp: Timestamp,
    pub battery: i32,
    pub temperature: f64,
    pub raw_adc: i32,
    pub min_value: f64,
    pub max_value: f64,
    pub avg_value: f64,
    pub point_count: usize,
}

impl SensorSnapshot {
    /// `None` for a sensor with no resident readings
    pub fn from_stats(stats: &StreamStats) -> Option<Self> {
        let latest = stats.latest_reading.as_ref()?;
        if stats.count == 0 {
            return None;
        }
        Some(Self {
            current_value: latest.value(),
            timestamp: latest.timestamp(),
            battery: latest.battery_percent(),
            temperature: latest.temperature_c(),
            raw_adc: latest.raw_value(),
            min_value: stats.min,
            max_value: stats.max,
            avg_value: stats.mean,
            point_count: stats.count,
        })
    }
}

/// Point-in-time view of every active sensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeSnapshot {
    /// Wall-clock time the snapshot was taken, ms
    pub timestamp: Timestamp,
    pub active_sensors: usize,
    pub total_points: usize,
    pub sensors: BTreeMap<String, SensorSnapshot>,
}

impl RealtimeSnapshot {
    pub fn from_stats(
        timestamp: Timestamp,
        stats: impl IntoIterator<Item = (String, StreamStats)>,
    ) -> Self {
        let sensors: BTreeMap<String, SensorSnapshot> = stats
            .into_iter()
            .filter_map(|(id, stats)| SensorSnapshot::from_stats(&stats).map(|snap| (id, snap)))
            .collect();

        Self {
            timestamp,
            active_sensors: sensors.len(),
            total_points: sensors.values().map(|s| s.point_count).sum(),
            sensors,
        }
    }
}

/// Aggregates for one sensor, without the latest reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorStreamStats {
    pub points: usize,
    pub latest_time: Timestamp,
    pub min_value: f64,
    pub max_value: f64,
    pub avg_value: f64,
}

impl From<&StreamStats> for SensorStreamStats {
    fn from(stats: &StreamStats) -> Self {
        Self {
            points: stats.count,
            latest_time: stats.latest_timestamp,
            min_value: stats.min,
            max_value: stats.max,
            avg_value: stats.mean,
        }
    }
}

/// Per-sensor aggregates across the store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamSummary {
    pub active_sensors: usize,
    pub total_points: usize,
    pub sensors: BTreeMap<String, SensorStreamStats>,
}

impl StreamSummary {
    /// Sensors with no resident readings are left out
    pub fn from_stats(stats: impl IntoIterator<Item = (String, StreamStats)>) -> Self {
        let sensors: BTreeMap<String, SensorStreamStats> = stats
            .into_iter()
            .filter(|(_, stats)| stats.count > 0)
            .map(|(id, stats)| (id, SensorStreamStats::from(&stats)))
            .collect();

        Self {
            active_sensors: sensors.len(),
            total_points: sensors.values().map(|s| s.points).sum(),
            sensors,
        }
    }
}

/// Ingestion and flush counters since construction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestCounters {
    pub accepted: u64,
    pub rejected_empty_id: u64,
    pub rejected_integrity: u64,
    pub rejected_out_of_range: u64,
    pub rejected_invalid_value: u64,
    /// Readings durably written
    pub flushed: u64,
    /// Sink calls that failed
    pub flush_failures: u64,
    /// Unflushed readings lost to the pending bound
    pub dropped_unflushed: u64,
}

impl IngestCounters {
    pub fn rejected(&self) -> u64 {
        self.rejected_empty_id
            + self.rejected_integrity
            + self.rejected_out_of_range
            + self.rejected_invalid_value
    }
}

/// In-memory footprint estimate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryUsage {
    pub total_points: usize,
    pub estimated_bytes: usize,
    pub points_per_sensor: usize,
    pub active_sensors: usize,
}

impl MemoryUsage {
    pub fn from_summary(summary: &StreamSummary) -> Self {
        let points_per_sensor = if summary.active_sensors > 0 {
            summary.total_points / summary.active_sensors
        } else {
            0
        };

        Self {
            total_points: summary.total_points,
            estimated_bytes: summary.total_points * ESTIMATED_BYTES_PER_POINT,
            points_per_sensor,
            active_sensors: summary.active_sensors,
        }
    }
}

/// Operational view of one aggregator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub stream_stats: StreamSummary,
    pub ingest: IngestCounters,
    /// Readings waiting for the next flush
    pub pending_flush: usize,
    pub memory_usage: MemoryUsage,
    pub config: AggregatorConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::Reading;

    fn stats(count: usize, value: f64) -> StreamStats {
        if count == 0 {
            return StreamStats::empty();
        }
        let latest = Reading::new("S", 500, value, 12, 77, 21.5);
        StreamStats {
            count,
            min: value - 1.0,
            max: value + 1.0,
            mean: value,
            latest_timestamp: latest.timestamp(),
            latest_reading: Some(latest),
        }
    }

    #[test]
    fn realtime_snapshot_skips_empty_sensors() {
        let snapshot = RealtimeSnapshot::from_stats(
            9_000,
            vec![("A".to_string(), stats(3, 10.0)), ("B".to_string(), stats(0, 0.0))],
        );
        assert_eq!(snapshot.timestamp, 9_000);
        assert_eq!(snapshot.active_sensors, 1);
        assert_eq!(snapshot.total_points, 3);

        let a = &snapshot.sensors["A"];
        assert_eq!(a.current_value, 10.0);
        assert_eq!(a.battery, 77);
        assert_eq!(a.raw_adc, 12);
        assert_eq!(a.min_value, 9.0);
    }

    #[test]
    fn summary_and_memory_estimate() {
        let summary = StreamSummary::from_stats(vec![
            ("A".to_string(), stats(4, 1.0)),
            ("B".to_string(), stats(6, 2.0)),
            ("C".to_string(), stats(0, 0.0)),
        ]);
        assert_eq!(summary.active_sensors, 2);
        assert_eq!(summary.total_points, 10);
        assert_eq!(summary.sensors["B"].points, 6);

        let memory = MemoryUsage::from_summary(&summary);
        assert_eq!(memory.estimated_bytes, 320);
        assert_eq!(memory.points_per_sensor, 5);

        assert_eq!(MemoryUsage::from_summary(&StreamSummary::default()).points_per_sensor, 0);
    }

    #[test]
    fn rejected_total() {
        let counters = IngestCounters {
            rejected_empty_id: 1,
            rejected_integrity: 2,
            rejected_out_of_range: 3,
            rejected_invalid_value: 4,
            ..Default::default()
        };
        assert_eq!(counters.rejected(), 10);
    }
}
