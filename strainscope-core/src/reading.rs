//! Strain-gauge reading model
//!
//! A [`Reading`] is one sample from one sensor. It is immutable once built:
//! fields are private and the integrity tag is computed exactly once, in
//! [`Reading::new`]. Decoders that receive a tag over the wire use
//! [`Reading::with_tag`] instead, and the aggregator verifies it at ingestion.
//!
//! ## Integrity tag
//!
//! The tag is a 31-multiplier rolling hash over a canonical text form of every
//! other field. Floats enter as IEEE-754 bit patterns so that any change to the
//! value or temperature, however small, changes the text:
//!
//! ```text
//! "{timestamp}|{value_bits:016x}|{raw}|{sensor_id}|{battery}|{temperature_bits:016x}"
//! ```

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::time::Timestamp;

/// Integrity tag over a reading's fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntegrityTag(u32);

impl IntegrityTag {
    /// Wrap a raw tag value (e.g. decoded from a frame)
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw tag value
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Compute the tag for a set of reading fields
    pub fn compute(
        timestamp: Timestamp,
        value: f64,
        raw_value: i32,
        sensor_id: &str,
        battery_percent: i32,
        temperature_c: f64,
    ) -> Self {
        let canonical = format!(
            "{}|{:016x}|{}|{}|{}|{:016x}",
            timestamp,
            value.to_bits(),
            raw_value,
            sensor_id,
            battery_percent,
            temperature_c.to_bits(),
        );

        let hash = canonical
            .bytes()
            .fold(0u32, |hash, byte| hash.wrapping_mul(31).wrapping_add(u32::from(byte)));
        Self(hash)
    }
}

impl fmt::Display for IntegrityTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

/// One strain-gauge sample
///
/// `sensor_id` is an `Arc<str>` so snapshot copies and flush batches share the
/// id instead of reallocating it per reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    timestamp: Timestamp,
    #[serde(rename = "strain_value")]
    value: f64,
    #[serde(rename = "raw_adc_value")]
    raw_value: i32,
    sensor_id: Arc<str>,
    #[serde(rename = "battery_level")]
    battery_percent: i32,
    #[serde(rename = "temperature")]
    temperature_c: f64,
    #[serde(rename = "checksum")]
    integrity_tag: IntegrityTag,
}

impl Reading {
    /// Build a reading and compute its integrity tag
    pub fn new(
        sensor_id: impl Into<Arc<str>>,
        timestamp: Timestamp,
        value: f64,
        raw_value: i32,
        battery_percent: i32,
        temperature_c: f64,
    ) -> Self {
        let sensor_id = sensor_id.into();
        let integrity_tag = IntegrityTag::compute(
            timestamp,
            value,
            raw_value,
            &sensor_id,
            battery_percent,
            temperature_c,
        );

        Self {
            timestamp,
            value,
            raw_value,
            sensor_id,
            battery_percent,
            temperature_c,
            integrity_tag,
        }
    }

    /// Build a reading carrying a tag produced elsewhere
    ///
    /// The tag is not checked here; `Aggregator::ingest` rejects the reading if
    /// it does not match.
    pub fn with_tag(
        sensor_id: impl Into<Arc<str>>,
        timestamp: Timestamp,
        value: f64,
        raw_value: i32,
        battery_percent: i32,
        temperature_c: f64,
        integrity_tag: IntegrityTag,
    ) -> Self {
        Self {
            timestamp,
            value,
            raw_value,
            sensor_id: sensor_id.into(),
            battery_percent,
            temperature_c,
            integrity_tag,
        }
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Calibrated strain in microstrain
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Pre-calibration ADC code
    pub fn raw_value(&self) -> i32 {
        self.raw_value
    }

    pub fn sensor_id(&self) -> &str {
        &self.sensor_id
    }

    /// Shared handle to the sensor id
    pub fn sensor_id_arc(&self) -> &Arc<str> {
        &self.sensor_id
    }

    pub fn battery_percent(&self) -> i32 {
        self.battery_percent
    }

    pub fn temperature_c(&self) -> f64 {
        self.temperature_c
    }

    pub fn integrity_tag(&self) -> IntegrityTag {
        self.integrity_tag
    }

    /// Recompute the tag from the current fields
    pub fn computed_tag(&self) -> IntegrityTag {
        IntegrityTag::compute(
            self.timestamp,
            self.value,
            self.raw_value,
            &self.sensor_id,
            self.battery_percent,
            self.temperature_c,
        )
    }

    /// True if the stored tag matches the fields
    pub fn verify_integrity(&self) -> bool {
        self.integrity_tag == self.computed_tag()
    }

    /// Compact point for incremental feeds
    pub fn to_point(&self) -> DataPoint {
        DataPoint {
            t: self.timestamp,
            v: self.value,
            r: self.raw_value,
            b: self.battery_percent,
            temp: self.temperature_c,
        }
    }
}

/// Compact reading projection used by the cursor feed
///
/// Short field names keep push payloads small.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    /// Timestamp, ms
    pub t: Timestamp,
    /// Strain value
    pub v: f64,
    /// Raw ADC code
    pub r: i32,
    /// Battery percent
    pub b: i32,
    /// Temperature, °C
    pub temp: f64,
}

/// Acquisition settings for one sensor node
///
/// Producers use this to turn ADC codes into microstrain before building a
/// [`Reading`]; the store itself never recalibrates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorConfiguration {
    pub sensor_id: String,
    pub sampling_rate_ms: u32,
    pub transmission_interval_s: u32,
    pub calibration_factor: f64,
    pub offset: f64,
    #[serde(default = "default_deep_sleep")]
    pub deep_sleep_enabled: bool,
}

fn default_deep_sleep() -> bool {
    true
}

impl SensorConfiguration {
    /// Defaults: 10 Hz sampling, 1 s transmission, identity calibration
    pub fn new(sensor_id: impl Into<String>) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            sampling_rate_ms: 100,
            transmission_interval_s: 1,
            calibration_factor: 1.0,
            offset: 0.0,
            deep_sleep_enabled: true,
        }
    }

    pub fn with_calibration(mut self, factor: f64, offset: f64) -> Self {
        self.calibration_factor = factor;
        self.offset = offset;
        self
    }

    /// Convert a raw ADC code to microstrain
    pub fn calibrate(&self, raw_value: i32) -> f64 {
        f64::from(raw_value) * self.calibration_factor + self.offset
    }

    /// Build a reading from a raw code using this configuration
    pub fn reading(
        &self,
        timestamp: Timestamp,
        raw_value: i32,
        battery_percent: i32,
        temperature_c: f64,
    ) -> Reading {
        Reading::new(
            self.sensor_id.as_str(),
            timestamp,
            self.calibrate(raw_value),
            raw_value,
            battery_percent,
            temperature_c,
        )
    }
}
