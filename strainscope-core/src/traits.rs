//! Core traits
//!
//! The two seams where the core meets code it does not own:
//! - [`Validator`]: the ingestion-boundary check
//! - [`DurableSink`]: the durable-storage collaborator fed by the flush worker
//!
//! Keep them small. Anything protocol-specific belongs in the implementor.

use std::time::Duration;

use crate::errors::{RejectReason, SinkError};
use crate::reading::Reading;

/// Ingestion-boundary validator
pub trait Validator {
    /// The type of value this validator handles
    type Value: ?Sized;

    /// Validate a single value; `Err` means drop it
    fn validate(&self, value: &Self::Value) -> Result<(), RejectReason>;
}

/// Durable-storage collaborator
///
/// Receives batches of accepted readings from the flush worker. A batch is
/// either durably written (`Ok`) or not (`Err`); on failure the aggregator keeps
/// the batch and retries on the next interval. No ordering guarantee is
/// required beyond that.
///
/// `timeout` is the aggregator's flush timeout. Implementations that perform
/// network or disk I/O should bound their call by it.
pub trait DurableSink: Send + Sync {
    /// Persist one batch
    fn persist(&self, batch: &[Reading], timeout: Duration) -> Result<(), SinkError>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

impl<S: DurableSink + ?Sized> DurableSink for std::sync::Arc<S> {
    fn persist(&self, batch: &[Reading], timeout: Duration) -> Result<(), SinkError> {
        (**self).persist(batch, timeout)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

impl<S: DurableSink + ?Sized> DurableSink for Box<S> {
    fn persist(&self, batch: &[Reading], timeout: Duration) -> Result<(), SinkError> {
        (**self).persist(batch, timeout)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
