//! SQLite connection pooling.

use std::path::{Path, PathBuf};

use bookingsync_domain::{DatabaseConfig, StoreError};
use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use tracing::info;

use crate::errors::InfraError;

/// Pool construction parameters.
#[derive(Debug, Clone)]
pub struct SqlitePoolConfig {
    pub path: PathBuf,
    pub pool_size: u32,
}

impl From<&DatabaseConfig> for SqlitePoolConfig {
    fn from(config: &DatabaseConfig) -> Self {
        Self { path: PathBuf::from(&config.path), pool_size: config.pool_size }
    }
}

/// Shared handle to a pool of SQLite connections.
///
/// Every connection enables foreign key enforcement on checkout; event
/// ownership relies on `ON DELETE CASCADE` firing when a feed is removed.
#[derive(Clone)]
pub struct SqlitePool {
    inner: r2d2::Pool<SqliteConnectionManager>,
}

impl SqlitePool {
    pub fn open(config: &SqlitePoolConfig) -> Result<Self, StoreError> {
        Self::open_at(&config.path, config.pool_size)
    }

    pub fn open_at(path: &Path, pool_size: u32) -> Result<Self, StoreError> {
        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.execute_batch(
                "PRAGMA foreign_keys = ON;
                 PRAGMA journal_mode = WAL;
                 PRAGMA busy_timeout = 5000;",
            )
        });

        let inner = r2d2::Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(InfraError::from)?;

        info!(path = %path.display(), pool_size, "sqlite pool opened");
        Ok(Self { inner })
    }

    pub(crate) fn get(
        &self,
    ) -> Result<PooledConnection<SqliteConnectionManager>, InfraError> {
        self.inner.get().map_err(InfraError::from)
    }
}

impl std::fmt::Debug for SqlitePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlitePool").field("max_size", &self.inner.max_size()).finish()
    }
}
