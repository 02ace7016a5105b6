//! Read model of enabled services.
//!
//! The orchestrator reads live state through [`StatusCache::enabled_service_names`]
//! and calls [`StatusCache::refresh`] after a mutation so that readers of the
//! cached snapshot (`entitle status`) see the new state.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::state::{EnabledService, HostStateStore, write_json_atomic};

pub trait StatusCache {
    /// Names of the services enabled right now.
    fn enabled_service_names(&self) -> anyhow::Result<BTreeSet<String>>;

    /// Rebuild the cached snapshot from live state.
    fn refresh(&self) -> anyhow::Result<()>;
}

/// Cached status written by [`FileStatusCache::refresh`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub refreshed_at: DateTime<Utc>,
    pub services: BTreeMap<String, EnabledService>,
}

impl StatusSnapshot {
    pub fn enabled_names(&self) -> BTreeSet<String> {
        self.services.keys().cloned().collect()
    }
}

/// Status cache backed by the host state file and `<state_dir>/status.json`.
#[derive(Debug, Clone)]
pub struct FileStatusCache {
    host_state: HostStateStore,
    cache_path: PathBuf,
}

impl FileStatusCache {
    pub fn new(host_state: HostStateStore, cache_path: PathBuf) -> Self {
        Self {
            host_state,
            cache_path,
        }
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    /// Last snapshot written by `refresh`, if any.
    pub fn cached(&self) -> anyhow::Result<Option<StatusSnapshot>> {
        if !self.cache_path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&self.cache_path).with_context(|| {
            format!("Failed to read status cache: {}", self.cache_path.display())
        })?;
        let snapshot = serde_json::from_slice(&bytes).with_context(|| {
            format!("Failed to parse status cache: {}", self.cache_path.display())
        })?;
        Ok(Some(snapshot))
    }

    /// Cached snapshot, refreshing first when none exists yet.
    pub fn current(&self) -> anyhow::Result<StatusSnapshot> {
        if let Some(snapshot) = self.cached()? {
            return Ok(snapshot);
        }
        self.refresh()?;
        self.cached()?
            .ok_or_else(|| anyhow::anyhow!("Status cache missing after refresh"))
    }
}

impl StatusCache for FileStatusCache {
    fn enabled_service_names(&self) -> anyhow::Result<BTreeSet<String>> {
        Ok(self.host_state.load()?.enabled_names())
    }

    fn refresh(&self) -> anyhow::Result<()> {
        let state = self.host_state.load()?;
        let snapshot = StatusSnapshot {
            refreshed_at: Utc::now(),
            services: state.services,
        };
        write_json_atomic(&self.cache_path, &snapshot)?;
        debug!(
            path = %self.cache_path.display(),
            enabled = snapshot.services.len(),
            "status cache refreshed"
        );
        Ok(())
    }
}
