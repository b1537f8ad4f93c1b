//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If the required variables are missing, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `BOOKINGSYNC_DB_PATH`: Database file path (required for env loading)
//! - `BOOKINGSYNC_DB_POOL_SIZE`: Connection pool size
//! - `BOOKINGSYNC_TICK_INTERVAL`: Seconds between scheduler ticks
//! - `BOOKINGSYNC_MAX_CONCURRENT_FEEDS`: Concurrency cap per tick
//! - `BOOKINGSYNC_RUN_TIMEOUT`: Per-run timeout in seconds
//! - `BOOKINGSYNC_SHUTDOWN_GRACE`: Shutdown grace period in seconds
//! - `BOOKINGSYNC_FETCH_TIMEOUT`: HTTP fetch timeout in seconds
//! - `BOOKINGSYNC_MAX_BODY_BYTES`: Maximum feed document size
//! - `BOOKINGSYNC_USER_AGENT`: User agent sent with feed requests
//! - `BOOKINGSYNC_DEPLOYMENT_MODE`: `persistent` or `ephemeral`
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./config.json` or `./config.toml` (current working directory)
//! 2. `./bookingsync.json` or `./bookingsync.toml` (current working directory)
//! 3. `../config.json` or `../config.toml` (parent directory)
//! 4. Relative to executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;

use bookingsync_domain::{
    Config, DatabaseConfig, DeploymentMode, FetchSettings, Result, SchedulerSettings, SyncError,
};

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If the required
/// variables are missing, falls back to loading from a config file.
///
/// # Errors
/// Returns `SyncError::Config` if configuration cannot be loaded from either
/// source.
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// `BOOKINGSYNC_DB_PATH` must be set; every other variable is optional and
/// falls back to its default.
///
/// # Errors
/// Returns `SyncError::Config` if the database path is missing or any set
/// variable has an invalid value.
pub fn load_from_env() -> Result<Config> {
    let db_path = env_var("BOOKINGSYNC_DB_PATH")?;

    let scheduler_defaults = SchedulerSettings::default();
    let fetch_defaults = FetchSettings::default();

    Ok(Config {
        database: DatabaseConfig {
            path: db_path,
            pool_size: env_parse("BOOKINGSYNC_DB_POOL_SIZE")?.unwrap_or(4),
        },
        scheduler: SchedulerSettings {
            tick_interval_secs: env_parse("BOOKINGSYNC_TICK_INTERVAL")?
                .unwrap_or(scheduler_defaults.tick_interval_secs),
            max_concurrent_feeds: env_parse("BOOKINGSYNC_MAX_CONCURRENT_FEEDS")?
                .unwrap_or(scheduler_defaults.max_concurrent_feeds),
            run_timeout_secs: env_parse("BOOKINGSYNC_RUN_TIMEOUT")?
                .unwrap_or(scheduler_defaults.run_timeout_secs),
            shutdown_grace_secs: env_parse("BOOKINGSYNC_SHUTDOWN_GRACE")?
                .unwrap_or(scheduler_defaults.shutdown_grace_secs),
        },
        fetch: FetchSettings {
            timeout_secs: env_parse("BOOKINGSYNC_FETCH_TIMEOUT")?
                .unwrap_or(fetch_defaults.timeout_secs),
            max_body_bytes: env_parse("BOOKINGSYNC_MAX_BODY_BYTES")?
                .unwrap_or(fetch_defaults.max_body_bytes),
            user_agent: std::env::var("BOOKINGSYNC_USER_AGENT")
                .unwrap_or(fetch_defaults.user_agent),
        },
        deployment_mode: env_parse("BOOKINGSYNC_DEPLOYMENT_MODE")?
            .unwrap_or(DeploymentMode::Persistent),
    })
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `SyncError::Config` if no file is found, the format is invalid, or
/// required fields are missing.
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(SyncError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            SyncError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| SyncError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content, format detected by extension.
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| SyncError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| SyncError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(SyncError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(vec![
            cwd.join("config.json"),
            cwd.join("config.toml"),
            cwd.join("bookingsync.json"),
            cwd.join("bookingsync.toml"),
            cwd.join("../config.json"),
            cwd.join("../config.toml"),
        ]);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(vec![
                exe_dir.join("config.json"),
                exe_dir.join("config.toml"),
                exe_dir.join("bookingsync.json"),
                exe_dir.join("bookingsync.toml"),
            ]);
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

/// Get required environment variable
fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| SyncError::Config(format!("Missing required environment variable: {key}")))
}

/// Parse an optional environment variable into `T`.
///
/// Returns `Ok(None)` when the variable is not set; a set variable that fails
/// to parse is an error rather than a silent fallback.
fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|e| SyncError::Config(format!("Invalid value for {key}: {e}"))),
        Err(_) => Ok(None),
    }
}
