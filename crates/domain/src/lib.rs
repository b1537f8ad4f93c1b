//! # BookingSync Domain
//!
//! Business domain types and models for BookingSync.
//!
//! This crate contains:
//! - Domain data types (Feed, CalendarEvent, SyncRun, etc.)
//! - Domain error taxonomy and Result definitions
//! - Configuration structures
//! - The iCalendar document parser (pure domain logic)
//!
//! ## Architecture
//! - No dependencies on other BookingSync crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod errors;
pub mod types;
pub mod utils;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
// Re-export iCal parser utilities
pub use utils::ical::{parse_ical, ParseOptions, ParseReport, ParsedItem, SkipReason};
