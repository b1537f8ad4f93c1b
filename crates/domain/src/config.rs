//! Application configuration structures
//!
//! Loaded by the infra layer from environment variables or a config file;
//! defined here so every layer shares one schema.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How the hosting process is deployed.
///
/// Under an ephemeral (serverless) host there is no guarantee of a persistent
/// process to own the scheduler's timer, so background work must stay off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentMode {
    Persistent,
    Ephemeral,
}

impl FromStr for DeploymentMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "persistent" => Ok(Self::Persistent),
            "ephemeral" | "serverless" => Ok(Self::Ephemeral),
            other => Err(format!("unrecognized deployment mode: {other}")),
        }
    }
}

/// Database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    #[serde(default = "defaults::pool_size")]
    pub pool_size: u32,
}

/// Scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    /// Seconds between scheduler ticks.
    #[serde(default = "defaults::tick_interval_secs")]
    pub tick_interval_secs: u64,
    /// Upper bound on feeds syncing concurrently within one tick.
    #[serde(default = "defaults::max_concurrent_feeds")]
    pub max_concurrent_feeds: usize,
    /// Timeout applied to a single feed run.
    #[serde(default = "defaults::run_timeout_secs")]
    pub run_timeout_secs: u64,
    /// Grace period for in-flight runs during shutdown.
    #[serde(default = "defaults::shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            tick_interval_secs: defaults::tick_interval_secs(),
            max_concurrent_feeds: defaults::max_concurrent_feeds(),
            run_timeout_secs: defaults::run_timeout_secs(),
            shutdown_grace_secs: defaults::shutdown_grace_secs(),
        }
    }
}

/// Feed fetcher settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchSettings {
    /// Connect+read timeout in seconds for one feed document.
    #[serde(default = "defaults::fetch_timeout_secs")]
    pub timeout_secs: u64,
    /// Maximum feed document size in bytes.
    #[serde(default = "defaults::max_body_bytes")]
    pub max_body_bytes: usize,
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout_secs: defaults::fetch_timeout_secs(),
            max_body_bytes: defaults::max_body_bytes(),
            user_agent: defaults::user_agent(),
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerSettings,
    #[serde(default)]
    pub fetch: FetchSettings,
    #[serde(default = "defaults::deployment_mode")]
    pub deployment_mode: DeploymentMode,
}

mod defaults {
    use super::DeploymentMode;

    pub(super) fn pool_size() -> u32 {
        4
    }

    // The original sync job ran every 30 minutes.
    pub(super) fn tick_interval_secs() -> u64 {
        1800
    }

    pub(super) fn max_concurrent_feeds() -> usize {
        4
    }

    pub(super) fn run_timeout_secs() -> u64 {
        120
    }

    pub(super) fn shutdown_grace_secs() -> u64 {
        10
    }

    pub(super) fn fetch_timeout_secs() -> u64 {
        30
    }

    pub(super) fn max_body_bytes() -> usize {
        1024 * 1024
    }

    pub(super) fn user_agent() -> String {
        "BookingSync/1.0".to_string()
    }

    pub(super) fn deployment_mode() -> DeploymentMode {
        DeploymentMode::Persistent
    }
}
