//! Trace Query Engine
//!
//! Turns a sensor's resident history into a bounded, plot-ready trace: two
//! parallel arrays plus the scaling metadata an oscilloscope view needs.
//!
//! ## Algorithm
//!
//! ```text
//! ring copy (oldest → newest)
//!   │  decimation d > 1: keep indices 0, d, 2d, ...
//!   ▼
//! decimated
//!   │  max_points m > 0 and len > m: keep the last m
//!   ▼
//! output
//! ```
//!
//! Decimation is plain stride sampling, no low-pass filtering. That is a
//! deliberate simplicity-over-fidelity choice for display purposes.
//!
//! Unknown sensors and empty rings produce an empty trace with all-zero
//! metadata. Empty is a valid result, not an error.

use serde::{Deserialize, Serialize};

use crate::index::value_bounds;
use crate::time::{span_seconds, Timestamp};

/// Floor for `y_range` so flat signals still scale sensibly
pub const FLAT_Y_RANGE: f64 = 1.0;

/// Trace request parameters
///
/// `max_points == 0` means no limit; `decimation` of 0 or 1 means none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TraceQuery {
    pub max_points: usize,
    pub decimation: usize,
}

impl TraceQuery {
    pub fn new(max_points: usize, decimation: usize) -> Self {
        Self {
            max_points,
            decimation,
        }
    }

    /// Effective stride, never below 1
    pub fn stride(&self) -> usize {
        self.decimation.max(1)
    }

    /// Effective point limit
    pub fn limit(&self) -> Option<usize> {
        (self.max_points > 0).then_some(self.max_points)
    }
}

/// Decimated, bounded trace ready for plotting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceResult {
    pub sensor_id: String,
    /// Timestamps in ms
    pub times: Vec<Timestamp>,
    pub values: Vec<f64>,
    pub point_count: usize,
    /// Last minus first retained timestamp, seconds
    pub time_span_seconds: f64,
    pub y_min: f64,
    pub y_max: f64,
    pub y_range: f64,
    /// Wall-clock time of the query, not of the data
    pub last_update_millis: Timestamp,
}

impl TraceResult {
    /// Trace for an unknown or empty sensor
    pub fn empty(sensor_id: &str, now: Timestamp) -> Self {
        Self {
            sensor_id: sensor_id.to_string(),
            times: Vec::new(),
            values: Vec::new(),
            point_count: 0,
            time_span_seconds: 0.0,
            y_min: 0.0,
            y_max: 0.0,
            y_range: 0.0,
            last_update_millis: now,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.point_count == 0
    }
}

/// Keep every `stride`-th sample starting at index 0, then the last `limit`
pub fn decimate<T>(samples: Vec<T>, query: TraceQuery) -> Vec<T> {
    let stride = query.stride();
    let mut kept: Vec<T> = if stride > 1 {
        samples.into_iter().step_by(stride).collect()
    } else {
        samples
    };

    if let Some(limit) = query.limit() {
        if kept.len() > limit {
            kept.drain(..kept.len() - limit);
        }
    }
    kept
}

/// Build a trace from `(timestamp, value)` samples copied out of a ring
pub fn build_trace(
    sensor_id: &str,
    samples: Vec<(Timestamp, f64)>,
    query: TraceQuery,
    now: Timestamp,
) -> TraceResult {
    let kept = decimate(samples, query);
    let Some((y_min, y_max)) = value_bounds(kept.iter().map(|&(_, v)| v)) else {
        return TraceResult::empty(sensor_id, now);
    };

    let (times, values): (Vec<Timestamp>, Vec<f64>) = kept.into_iter().unzip();

    let time_span_seconds = match (times.first(), times.last()) {
        (Some(&first), Some(&last)) if times.len() > 1 => span_seconds(first, last),
        _ => 0.0,
    };

    let y_range = y_max - y_min;
    let y_range = if y_range == 0.0 { FLAT_Y_RANGE } else { y_range };

    TraceResult {
        sensor_id: sensor_id.to_string(),
        point_count: times.len(),
        times,
        values,
        time_span_seconds,
        y_min,
        y_max,
        y_range,
        last_update_millis: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(timestamps: impl IntoIterator<Item = u64>) -> Vec<(u64, f64)> {
        timestamps.into_iter().map(|t| (t, t as f64 / 100.0)).collect()
    }

    #[test]
    fn no_decimation_no_limit_keeps_everything() {
        let trace = build_trace("S", samples([100, 200, 300]), TraceQuery::new(0, 1), 42);
        assert_eq!(trace.times, vec![100, 200, 300]);
        assert_eq!(trace.values, vec![1.0, 2.0, 3.0]);
        assert_eq!(trace.point_count, 3);
        assert_eq!(trace.time_span_seconds, 0.2);
        assert_eq!(trace.y_min, 1.0);
        assert_eq!(trace.y_max, 3.0);
        assert_eq!(trace.y_range, 2.0);
        assert_eq!(trace.last_update_millis, 42);
    }

    #[test]
    fn stride_starts_at_zero() {
        let trace = build_trace("S", samples(0..10), TraceQuery::new(0, 3), 0);
        assert_eq!(trace.times, vec![0, 3, 6, 9]);
    }

    #[test]
    fn zero_decimation_means_none() {
        let trace = build_trace("S", samples(0..5), TraceQuery::new(0, 0), 0);
        assert_eq!(trace.point_count, 5);
    }

    #[test]
    fn truncation_keeps_tail() {
        let trace = build_trace("S", samples([100, 200, 300, 400, 500]), TraceQuery::new(2, 1), 0);
        assert_eq!(trace.times, vec![400, 500]);
    }

    #[test]
    fn decimate_then_truncate() {
        // stride 2 over 0..10 -> 0,2,4,6,8 ; last 3 -> 4,6,8
        let trace = build_trace("S", samples(0..10), TraceQuery::new(3, 2), 0);
        assert_eq!(trace.times, vec![4, 6, 8]);
    }

    #[test]
    fn y_bounds_cover_output_only() {
        let mut input = samples([1, 2, 3]);
        input[0].1 = -1000.0;
        let trace = build_trace("S", input, TraceQuery::new(2, 1), 0);
        assert_eq!(trace.y_min, 0.02);
        assert_eq!(trace.y_max, 0.03);
    }

    #[test]
    fn flat_signal_floors_range() {
        let trace = build_trace("S", vec![(1, 5.0), (2, 5.0)], TraceQuery::default(), 0);
        assert_eq!(trace.y_range, FLAT_Y_RANGE);
        assert_eq!(trace.y_min, 5.0);
    }

    #[test]
    fn single_point_has_zero_span() {
        let trace = build_trace("S", vec![(7, 1.5)], TraceQuery::default(), 0);
        assert_eq!(trace.time_span_seconds, 0.0);
        assert_eq!(trace.y_range, FLAT_Y_RANGE);
    }

    #[test]
    fn empty_input_is_empty_trace() {
        let trace = build_trace("Z", Vec::new(), TraceQuery::new(10, 1), 99);
        assert_eq!(trace, TraceResult::empty("Z", 99));
        assert_eq!(trace.y_range, 0.0);
        assert!(trace.is_empty());
    }
}
