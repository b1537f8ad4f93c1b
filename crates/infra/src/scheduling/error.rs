//! Scheduler error types

use bookingsync_domain::{StoreError, SyncError};
use thiserror::Error;

/// Scheduler-specific errors
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Scheduler is already running
    #[error("Scheduler already running")]
    AlreadyRunning,

    /// Scheduler is not running
    #[error("Scheduler not running")]
    NotRunning,

    /// In-flight runs did not drain within the shutdown grace period
    #[error("Scheduler did not stop within {seconds}s")]
    ShutdownTimeout { seconds: u64 },

    /// Background task join failed
    #[error("Task join failed: {0}")]
    TaskJoinFailed(String),

    /// Referenced feed does not exist
    #[error("Feed not found: {0}")]
    FeedNotFound(String),

    /// Feed lookup against the store failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<SchedulerError> for SyncError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::Store(store) => SyncError::Store(store),
            other => SyncError::Internal(other.to_string()),
        }
    }
}

/// Convenience type alias for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;
