//! Per-feed synchronization pipeline

mod worker;

pub use worker::{FeedSyncWorker, RunStats};
