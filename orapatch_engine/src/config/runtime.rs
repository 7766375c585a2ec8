// RUNTIME PREFERENCES (environment overridable)

use super::constants::{env_vars, paths, timing};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnginePreferences {
    /// Wall-clock limit for interactive commands
    pub interactive_timeout_secs: u64,

    /// Limit for non-interactive commands; `None` waits for completion
    pub command_timeout_secs: Option<u64>,

    /// Interval between cluster health polls
    pub health_poll_secs: u64,

    /// Total wait for the cluster stack to come online
    pub health_budget_secs: u64,

    /// Operating-system instance registry
    pub oratab: PathBuf,

    /// System-default inventory pointer file
    pub orainst_loc: PathBuf,

    /// Local registry pointer naming the cluster home
    pub olr_loc: PathBuf,

    /// Directory receiving the OCM response file
    pub response_dir: PathBuf,
}

impl Default for EnginePreferences {
    fn default() -> Self {
        Self {
            interactive_timeout_secs: env::var(env_vars::INTERACTIVE_TIMEOUT_SECS)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(timing::INTERACTIVE_TIMEOUT_SECS),
            command_timeout_secs: env::var(env_vars::COMMAND_TIMEOUT_SECS)
                .ok()
                .and_then(|v| v.parse().ok()),
            health_poll_secs: env::var(env_vars::HEALTH_POLL_SECS)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(timing::HEALTH_POLL_SECS),
            health_budget_secs: env::var(env_vars::HEALTH_BUDGET_SECS)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(timing::HEALTH_BUDGET_SECS),
            oratab: env::var(env_vars::ORATAB)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(paths::ORATAB)),
            orainst_loc: env::var(env_vars::ORAINST_LOC)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(paths::ORAINST_LOC)),
            olr_loc: env::var(env_vars::OLR_LOC)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(paths::OLR_LOC)),
            response_dir: env::var(env_vars::RESPONSE_DIR)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(paths::RESPONSE_DIR)),
        }
    }
}

impl EnginePreferences {
    pub fn interactive_timeout(&self) -> Duration {
        Duration::from_secs(self.interactive_timeout_secs)
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_secs.map(Duration::from_secs)
    }

    pub fn health_poll(&self) -> Duration {
        Duration::from_secs(self.health_poll_secs)
    }

    pub fn health_budget(&self) -> Duration {
        Duration::from_secs(self.health_budget_secs)
    }

    pub fn with_oratab(mut self, path: impl Into<PathBuf>) -> Self {
        self.oratab = path.into();
        self
    }

    pub fn with_orainst_loc(mut self, path: impl Into<PathBuf>) -> Self {
        self.orainst_loc = path.into();
        self
    }

    pub fn with_olr_loc(mut self, path: impl Into<PathBuf>) -> Self {
        self.olr_loc = path.into();
        self
    }

    pub fn with_response_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.response_dir = path.into();
        self
    }

    pub fn with_health_timing(mut self, poll_secs: u64, budget_secs: u64) -> Self {
        self.health_poll_secs = poll_secs;
        self.health_budget_secs = budget_secs;
        self
    }
}
