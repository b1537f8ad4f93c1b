//! Observability: sync metrics and their error type.

mod metrics;

pub use metrics::{MetricsSnapshot, SyncMetrics};

use thiserror::Error;

/// Errors raised by metric aggregation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetricsError {
    #[error("No data recorded yet")]
    EmptyData,
}

pub type MetricsResult<T> = Result<T, MetricsError>;
