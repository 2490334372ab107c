//! Ingestion-boundary validation
//!
//! Every reading passes a validator before it may touch a ring. Failures are
//! expected: strain nodes on moving machinery drop bits, brown out and report
//! garbage battery levels. A failed reading is dropped and counted, never
//! raised.
//!
//! ## Checks, in order
//!
//! 1. Sensor id is non-empty
//! 2. Strain value is a finite number
//! 3. Stored integrity tag matches the recomputed one
//! 4. Battery percent within `[0, 100]`
//! 5. Temperature within `[-40, 85]` °C (node operating range)
//!
//! ## Customization
//!
//! ```rust
//! use strainscope_core::validators::ReadingValidator;
//! use strainscope_core::traits::Validator;
//! use strainscope_core::Reading;
//!
//! // Cab-mounted node rated for a narrower band
//! let validator = ReadingValidator::default().with_temperature_range(-20.0, 60.0);
//! let reading = Reading::new("boom-left", 1_000, 120.0, 4_000, 80, 70.0);
//! assert!(validator.validate(&reading).is_err());
//! ```

mod utils;

pub use utils::{check_integrity, check_range};

use crate::errors::RejectReason;
use crate::reading::Reading;
use crate::traits::Validator;

/// Default battery bounds, percent
pub const BATTERY_RANGE: (i32, i32) = (0, 100);

/// Default node operating temperature, °C
pub const TEMPERATURE_RANGE_C: (f64, f64) = (-40.0, 85.0);

/// Validator for strain readings at the ingestion boundary
#[derive(Debug, Clone)]
pub struct ReadingValidator {
    battery_min: i32,
    battery_max: i32,
    temperature_min_c: f64,
    temperature_max_c: f64,
}

impl Default for ReadingValidator {
    fn default() -> Self {
        Self {
            battery_min: BATTERY_RANGE.0,
            battery_max: BATTERY_RANGE.1,
            temperature_min_c: TEMPERATURE_RANGE_C.0,
            temperature_max_c: TEMPERATURE_RANGE_C.1,
        }
    }
}

impl ReadingValidator {
    /// Override the temperature band; bounds are swapped if given reversed
    pub fn with_temperature_range(mut self, min: f64, max: f64) -> Self {
        let (min, max) = if min > max { (max, min) } else { (min, max) };
        self.temperature_min_c = min;
        self.temperature_max_c = max;
        self
    }
}

impl Validator for ReadingValidator {
    type Value = Reading;

    fn validate(&self, reading: &Reading) -> Result<(), RejectReason> {
        if reading.sensor_id().is_empty() {
            return Err(RejectReason::EmptySensorId);
        }

        if !reading.value().is_finite() {
            return Err(RejectReason::InvalidValue);
        }

        check_integrity(reading)?;

        check_range(
            "battery_percent",
            f64::from(reading.battery_percent()),
            f64::from(self.battery_min),
            f64::from(self.battery_max),
        )?;

        check_range(
            "temperature_c",
            reading.temperature_c(),
            self.temperature_min_c,
            self.temperature_max_c,
        )
    }
}
