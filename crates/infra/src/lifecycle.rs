//! Deployment-mode lifecycle guard.
//!
//! The scheduler owns a long-lived background timer, which only makes sense
//! when the hosting process itself is long-lived. Under an ephemeral
//! (serverless) host the guard keeps the scheduler off entirely; syncs then
//! happen only through explicit triggers.

use bookingsync_domain::DeploymentMode;
use tracing::info;

use crate::scheduling::{SchedulerResult, SyncScheduler};

/// Decides whether background scheduling may run in this process.
#[derive(Debug, Clone, Copy)]
pub struct LifecycleGuard {
    mode: DeploymentMode,
}

impl LifecycleGuard {
    pub fn new(mode: DeploymentMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> DeploymentMode {
        self.mode
    }

    /// Whether this process is allowed to own the background scheduler.
    pub fn should_start(&self) -> bool {
        matches!(self.mode, DeploymentMode::Persistent)
    }

    /// Start the scheduler if the deployment mode allows it.
    ///
    /// Returns `true` when the scheduler was started, `false` when the guard
    /// kept it off.
    pub async fn start_if_allowed(&self, scheduler: &mut SyncScheduler) -> SchedulerResult<bool> {
        if !self.should_start() {
            info!(mode = ?self.mode, "Background scheduler disabled by deployment mode");
            return Ok(false);
        }
        scheduler.start().await?;
        Ok(true)
    }
}
