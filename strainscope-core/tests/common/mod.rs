//! Common test utilities and data generators for integration tests
//!
//! This module provides:
//! - Strain generators modelled on machinery load scenarios
//! - Helpers to corrupt readings the way a flaky radio link does
//! - Small assertion and polling helpers

#![allow(dead_code)]

use std::time::{Duration, Instant};

use strainscope_core::{IntegrityTag, Reading, SensorConfiguration, Timestamp};

pub mod generators;

pub use generators::{LoadScenario, StrainGenerator, TestRng};

/// Readings with timestamps `ts` and value equal to the timestamp
pub fn linear_readings(sensor_id: &str, timestamps: impl IntoIterator<Item = Timestamp>) -> Vec<Reading> {
    timestamps
        .into_iter()
        .map(|ts| Reading::new(sensor_id, ts, ts as f64, ts as i32, 90, 20.0))
        .collect()
}

/// Same fields, tag that no longer matches
pub fn with_bad_tag(reading: &Reading) -> Reading {
    let tag = IntegrityTag::from_raw(reading.integrity_tag().as_u32() ^ 0x5a5a_5a5a);
    Reading::with_tag(
        reading.sensor_id(),
        reading.timestamp(),
        reading.value(),
        reading.raw_value(),
        reading.battery_percent(),
        reading.temperature_c(),
        tag,
    )
}

/// Reading whose value was flipped in transit after the tag was computed
pub fn with_flipped_value(reading: &Reading) -> Reading {
    Reading::with_tag(
        reading.sensor_id(),
        reading.timestamp(),
        reading.value() + 1.0,
        reading.raw_value(),
        reading.battery_percent(),
        reading.temperature_c(),
        reading.integrity_tag(),
    )
}

pub fn timestamps(readings: &[Reading]) -> Vec<Timestamp> {
    readings.iter().map(Reading::timestamp).collect()
}

/// Default node configuration with a typical HX711 calibration
pub fn calibrated_node(sensor_id: &str) -> SensorConfiguration {
    SensorConfiguration::new(sensor_id).with_calibration(0.0125, -3.0)
}

/// Poll `condition` until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// Assert two floats agree to a relative tolerance
pub fn assert_close(actual: f64, expected: f64, tolerance: f64) {
    let scale = expected.abs().max(1.0);
    assert!(
        (actual - expected).abs() <= tolerance * scale,
        "expected {} ≈ {} (tolerance {})",
        actual,
        expected,
        tolerance
    );
}
