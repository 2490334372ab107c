//! Cursor Feed - incremental "what's new since X" reads
//!
//! The server keeps no per-client state. A client remembers the
//! `latest_millis` it was handed and passes it back as `since_millis` on its
//! next call. Repeating a call without intervening ingests returns the same
//! result, so reconnecting clients simply resume from their stored cursor.
//!
//! Readings evicted from the ring between two polls are gone; the feed gives
//! no backlog guarantee beyond ring capacity.
//!
//! `has_more` means "this call returned new data". It is not a pagination
//! flag: every matching point is returned in one response.

use serde::{Deserialize, Serialize};

use crate::reading::DataPoint;
use crate::time::Timestamp;

/// Result of one cursor poll
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncrementalResult {
    pub sensor_id: String,
    pub new_points: usize,
    /// Points newer than the cursor, arrival order
    pub points: Vec<DataPoint>,
    /// Cursor to pass on the next call
    pub latest_millis: Timestamp,
    pub has_more: bool,
}

impl IncrementalResult {
    /// Nothing new: cursor is handed back unchanged
    pub fn empty(sensor_id: &str, since_millis: Timestamp) -> Self {
        Self {
            sensor_id: sensor_id.to_string(),
            new_points: 0,
            points: Vec::new(),
            latest_millis: since_millis,
            has_more: false,
        }
    }

    /// Wrap points already filtered against `since_millis`
    pub fn from_points(sensor_id: &str, since_millis: Timestamp, points: Vec<DataPoint>) -> Self {
        let Some(last) = points.last() else {
            return Self::empty(sensor_id, since_millis);
        };

        Self {
            sensor_id: sensor_id.to_string(),
            new_points: points.len(),
            latest_millis: last.t,
            has_more: true,
            points,
        }
    }
}

/// Filter predicate shared by every cursor read
pub fn is_newer(timestamp: Timestamp, since_millis: Timestamp) -> bool {
    timestamp > since_millis
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(t: Timestamp) -> DataPoint {
        DataPoint {
            t,
            v: t as f64,
            r: 0,
            b: 100,
            temp: 20.0,
        }
    }

    #[test]
    fn empty_keeps_cursor() {
        let result = IncrementalResult::empty("S", 1234);
        assert_eq!(result.latest_millis, 1234);
        assert!(!result.has_more);
        assert_eq!(result.new_points, 0);
    }

    #[test]
    fn cursor_advances_to_last_point() {
        let result = IncrementalResult::from_points("S", 100, vec![point(200), point(300)]);
        assert_eq!(result.new_points, 2);
        assert_eq!(result.latest_millis, 300);
        assert!(result.has_more);
    }

    #[test]
    fn cursor_is_last_in_arrival_order() {
        // out-of-order producer timestamps: cursor follows the last point returned
        let result = IncrementalResult::from_points("S", 100, vec![point(500), point(200)]);
        assert_eq!(result.latest_millis, 200);
    }

    #[test]
    fn newer_is_strict() {
        assert!(is_newer(101, 100));
        assert!(!is_newer(100, 100));
    }

    #[test]
    fn points_serialize_compactly() {
        let json = serde_json::to_string(&point(5)).unwrap();
        assert_eq!(json, r#"{"t":5,"v":5.0,"r":0,"b":100,"temp":20.0}"#);
    }
}
