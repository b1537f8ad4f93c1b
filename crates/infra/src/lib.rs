//! # BookingSync Infrastructure
//!
//! Infrastructure implementations of core domain ports.
//!
//! This crate contains:
//! - Database implementations (SQLite feed store)
//! - HTTP feed fetcher
//! - The sync scheduler and its lifecycle guard
//! - Configuration loading and observability
//!
//! ## Architecture
//! - Implements traits defined in `bookingsync-core`
//! - Depends on `bookingsync-domain` and `bookingsync-core`
//! - Contains all "impure" code (I/O, timers)

pub mod config;
pub mod database;
pub mod errors;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod scheduling;
pub mod sync;

// Re-export commonly used items
pub use database::{SqliteFeedStore, SqlitePool, SqlitePoolConfig};
pub use http::{HttpFeedFetcher, HttpFeedFetcherBuilder};
pub use lifecycle::LifecycleGuard;
pub use scheduling::{SchedulerStatus, SyncScheduler, SyncSchedulerConfig, TriggerOutcome};
pub use sync::{FeedSyncWorker, RunStats};
