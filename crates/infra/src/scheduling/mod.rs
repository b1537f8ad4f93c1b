//! Background scheduling

pub mod error;
mod sync_scheduler;

pub use error::{SchedulerError, SchedulerResult};
pub use sync_scheduler::{
    FeedRunStatus, SchedulerStatus, SyncScheduler, SyncSchedulerConfig, TriggerOutcome,
};
