//! # BookingSync Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port/adapter interfaces (traits) for fetching and storage
//! - The event reconciler (pure diff computation)
//!
//! ## Architecture Principles
//! - Only depends on `bookingsync-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits
//! - Pure, testable business logic

pub mod sync;

// Re-export specific items to avoid ambiguity
pub use sync::ports::{FeedFetcher, FeedStore};
pub use sync::reconciler::reconcile;
