//! HTTP infrastructure

mod fetcher;

pub use fetcher::{HttpFeedFetcher, HttpFeedFetcherBuilder};
