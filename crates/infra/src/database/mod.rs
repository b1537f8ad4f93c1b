//! SQLite persistence

mod feed_store;
mod pool;

pub use feed_store::SqliteFeedStore;
pub use pool::{SqlitePool, SqlitePoolConfig};
