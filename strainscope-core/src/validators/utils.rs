//! Shared checks used by reading validators
//!
//! Pure functions, no allocation. Inputs that fail return a `RejectReason`
//! instead of panicking.

use crate::errors::RejectReason;
use crate::reading::Reading;

/// Check that `value` lies in `[min, max]`
///
/// NaN fails the check.
pub fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), RejectReason> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(RejectReason::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

/// Check the stored integrity tag against a fresh computation
pub fn check_integrity(reading: &Reading) -> Result<(), RejectReason> {
    let computed = reading.computed_tag();
    let stored = reading.integrity_tag();
    if stored == computed {
        Ok(())
    } else {
        Err(RejectReason::IntegrityMismatch { stored, computed })
    }
}
