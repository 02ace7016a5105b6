//! Configuration schema for entitle.toml

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::lock::{DEFAULT_MAX_RETRIES, DEFAULT_RETRY_INTERVAL};
use crate::orchestration::EnablePolicy;
use crate::orchestration::precondition::DEFAULT_EXCLUDED_SERVICES;

/// Root configuration structure for entitle.toml
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntitleConfig {
    /// Directory for lock, host state and status cache
    #[serde(default)]
    pub state_dir: Option<PathBuf>,

    /// Service catalog; relative paths resolve against the config directory
    #[serde(default)]
    pub catalog: Option<PathBuf>,

    #[serde(default)]
    pub lock: LockConfig,

    #[serde(default)]
    pub api: ApiConfig,
}

/// Retry window for the host-wide lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LockConfig {
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            retry_interval_ms: default_retry_interval_ms(),
            max_retries: default_max_retries(),
        }
    }
}

impl LockConfig {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

fn default_retry_interval_ms() -> u64 {
    DEFAULT_RETRY_INTERVAL.as_millis() as u64
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    /// Services that may not be enabled through the API
    #[serde(default = "default_excluded_services")]
    pub excluded_services: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            excluded_services: default_excluded_services(),
        }
    }
}

impl ApiConfig {
    pub fn policy(&self) -> EnablePolicy {
        EnablePolicy::with_excluded(self.excluded_services.iter().cloned())
    }
}

fn default_excluded_services() -> Vec<String> {
    DEFAULT_EXCLUDED_SERVICES
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl EntitleConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.lock.retry_interval_ms == 0 && self.lock.max_retries > 0 {
            anyhow::bail!("lock.retry_interval_ms must be greater than 0 when retries are enabled");
        }
        if let Some(empty) = self.api.excluded_services.iter().find(|s| s.trim().is_empty()) {
            anyhow::bail!("api.excluded_services contains an empty name: {:?}", empty);
        }
        Ok(())
    }
}
