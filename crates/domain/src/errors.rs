//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while retrieving a feed document over the network.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail")]
pub enum FetchError {
    #[error("Fetch timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP status {0}")]
    HttpStatus(u16),

    #[error("Response exceeds {limit} bytes")]
    TooLarge { limit: usize },
}

/// Errors raised while parsing a feed document.
///
/// Per-event problems are never errors; they are reported as skipped items in
/// the parse report. Only a document whose overall structure cannot be
/// recognized fails outright.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail")]
pub enum ParseError {
    #[error("Malformed document: {0}")]
    MalformedDocument(String),
}

/// Errors raised by the feed store gateway.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail")]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Transaction failed: {0}")]
    Transaction(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Main error type for BookingSync sync operations.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail")]
pub enum SyncError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Run cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SyncError {
    /// Short stable label for the error kind, used when recording run
    /// outcomes.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Fetch(FetchError::Timeout) => "fetch_timeout",
            Self::Fetch(FetchError::Network(_)) => "fetch_network",
            Self::Fetch(FetchError::HttpStatus(_)) => "fetch_http_status",
            Self::Fetch(FetchError::TooLarge { .. }) => "fetch_too_large",
            Self::Parse(_) => "parse",
            Self::Store(_) => "store",
            Self::Config(_) => "config",
            Self::Cancelled => "cancelled",
            Self::Internal(_) => "internal",
        }
    }
}

/// Result type alias for BookingSync operations
pub type Result<T> = std::result::Result<T, SyncError>;
