//! Aggregator configuration
//!
//! Loading configuration files is the embedding application's job; this module
//! only defines the settings, their defaults, and the checks that make the core
//! refuse to start with an unusable bound.
//!
//! ```rust
//! use strainscope_core::AggregatorConfig;
//!
//! let config = AggregatorConfig::from_json_str(r#"{ "capacity": 2000, "flush_interval_ms": 5000 }"#)?;
//! assert_eq!(config.capacity, 2000);
//! assert_eq!(config.flush_threshold, AggregatorConfig::default().flush_threshold);
//! # Ok::<(), strainscope_core::CoreError>(())
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{CoreError, CoreResult};

/// Readings kept per sensor
pub const DEFAULT_CAPACITY: usize = 1000;

/// Time between scheduled flushes
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 60_000;

/// Pending readings that trigger an early flush
pub const DEFAULT_FLUSH_THRESHOLD: usize = 10_000;

/// Unflushed readings retained while the sink is failing
pub const DEFAULT_MAX_PENDING: usize = 100_000;

/// Bound handed to the sink for one persist call
pub const DEFAULT_FLUSH_TIMEOUT_MS: u64 = 10_000;

/// Settings for one [`Aggregator`](crate::Aggregator)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Ring capacity for every sensor
    pub capacity: usize,
    pub flush_interval_ms: u64,
    pub flush_threshold: usize,
    /// Oldest unflushed readings are dropped beyond this
    pub max_pending: usize,
    pub flush_timeout_ms: u64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            flush_interval_ms: DEFAULT_FLUSH_INTERVAL_MS,
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            max_pending: DEFAULT_MAX_PENDING,
            flush_timeout_ms: DEFAULT_FLUSH_TIMEOUT_MS,
        }
    }
}

impl AggregatorConfig {
    /// Parse from JSON; missing fields take defaults
    pub fn from_json_str(json: &str) -> CoreResult<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| CoreError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_flush_threshold(mut self, threshold: usize) -> Self {
        self.flush_threshold = threshold;
        self
    }

    pub fn with_max_pending(mut self, max_pending: usize) -> Self {
        self.max_pending = max_pending;
        self
    }

    pub fn with_flush_timeout(mut self, timeout: Duration) -> Self {
        self.flush_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn flush_timeout(&self) -> Duration {
        Duration::from_millis(self.flush_timeout_ms)
    }

    /// Reject settings the core cannot run with
    pub fn validate(&self) -> CoreResult<()> {
        if self.capacity == 0 {
            return Err(CoreError::InvalidConfig {
                field: "capacity",
                reason: "must be at least 1",
            });
        }
        if self.flush_interval_ms == 0 {
            return Err(CoreError::InvalidConfig {
                field: "flush_interval_ms",
                reason: "must be non-zero",
            });
        }
        if self.flush_threshold == 0 {
            return Err(CoreError::InvalidConfig {
                field: "flush_threshold",
                reason: "must be at least 1",
            });
        }
        if self.max_pending < self.flush_threshold {
            return Err(CoreError::InvalidConfig {
                field: "max_pending",
                reason: "must not be below flush_threshold",
            });
        }
        if self.flush_timeout_ms == 0 {
            return Err(CoreError::InvalidConfig {
                field: "flush_timeout_ms",
                reason: "must be non-zero",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AggregatorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.capacity, 1000);
        assert_eq!(config.flush_interval(), Duration::from_secs(60));
    }

    #[test]
    fn zero_capacity_is_fatal() {
        let err = AggregatorConfig::default().with_capacity(0).validate().unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfig { field: "capacity", .. }));
    }

    #[test]
    fn pending_bound_must_cover_threshold() {
        let err = AggregatorConfig::default()
            .with_flush_threshold(500)
            .with_max_pending(100)
            .validate()
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfig { field: "max_pending", .. }));
    }

    #[test]
    fn zero_durations_are_fatal() {
        assert!(AggregatorConfig::default()
            .with_flush_interval(Duration::ZERO)
            .validate()
            .is_err());
        assert!(AggregatorConfig::default()
            .with_flush_timeout(Duration::from_micros(10))
            .validate()
            .is_err());
    }

    #[test]
    fn json_round_trip_with_defaults() {
        let config = AggregatorConfig::from_json_str(r#"{"capacity": 5}"#).unwrap();
        assert_eq!(config.capacity, 5);
        assert_eq!(config.max_pending, DEFAULT_MAX_PENDING);

        assert!(matches!(
            AggregatorConfig::from_json_str(r#"{"capacity": 0}"#),
            Err(CoreError::InvalidConfig { .. })
        ));
        assert!(matches!(
            AggregatorConfig::from_json_str("not json"),
            Err(CoreError::Parse(_))
        ));
    }
}
