//! Persistent record of which services are enabled on this host.
//!
//! Stored as `<state_dir>/services.json` and saved atomically (tmp + rename).

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const HOST_STATE_VERSION: u32 = 1;

/// One enabled service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnabledService {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    #[serde(default)]
    pub access_only: bool,
    pub enabled_at: DateTime<Utc>,
}

impl EnabledService {
    pub fn new(variant: Option<String>, access_only: bool) -> Self {
        Self {
            variant,
            access_only,
            enabled_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostState {
    pub version: u32,
    #[serde(default)]
    pub services: BTreeMap<String, EnabledService>,
}

impl Default for HostState {
    fn default() -> Self {
        Self {
            version: HOST_STATE_VERSION,
            services: BTreeMap::new(),
        }
    }
}

impl HostState {
    pub fn is_enabled(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }

    pub fn enabled_names(&self) -> BTreeSet<String> {
        self.services.keys().cloned().collect()
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.version != HOST_STATE_VERSION {
            anyhow::bail!(
                "Unsupported host state version {} (expected {})",
                self.version,
                HOST_STATE_VERSION
            );
        }
        Ok(())
    }
}

/// Load/modify/save access to [`HostState`].
#[derive(Debug, Clone)]
pub struct HostStateStore {
    path: PathBuf,
}

impl HostStateStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the state; a missing file means nothing is enabled.
    pub fn load(&self) -> anyhow::Result<HostState> {
        if !self.path.exists() {
            return Ok(HostState::default());
        }
        let bytes = fs::read(&self.path)
            .with_context(|| format!("Failed to read host state: {}", self.path.display()))?;
        let state: HostState = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse host state: {}", self.path.display()))?;
        state.validate()?;
        Ok(state)
    }

    pub fn save(&self, state: &HostState) -> anyhow::Result<()> {
        write_json_atomic(&self.path, state)
    }

    /// Apply `f` to the stored state and save the result.
    pub fn modify<F>(&self, f: F) -> anyhow::Result<()>
    where
        F: FnOnce(&mut HostState),
    {
        let mut state = self.load()?;
        f(&mut state);
        self.save(&state)
    }

    pub fn mark_enabled(&self, name: &str, service: EnabledService) -> anyhow::Result<()> {
        self.modify(|state| {
            state.services.insert(name.to_string(), service);
        })
    }

    /// Returns `true` if the service was enabled before.
    pub fn mark_disabled(&self, name: &str) -> anyhow::Result<bool> {
        let mut state = self.load()?;
        let removed = state.services.remove(name).is_some();
        if removed {
            self.save(&state)?;
        }
        Ok(removed)
    }
}

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Serialize `value` as pretty JSON and move it into place atomically.
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("Path has no parent directory: {}", path.display()))?;
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let tmp_path = dir.join(format!(
        "{}.{}.{}.tmp",
        file_name,
        std::process::id(),
        TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    let bytes = serde_json::to_vec_pretty(value).context("Failed to serialize JSON")?;
    fs::write(&tmp_path, bytes)
        .with_context(|| format!("Failed to write tmp file: {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .with_context(|| format!("Failed to rename tmp file: {}", tmp_path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_state_is_empty() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let store = HostStateStore::new(tmp.path().join("services.json"));
        let state = store.load().expect("load should succeed");
        assert!(state.services.is_empty());
        assert_eq!(state.version, HOST_STATE_VERSION);
    }

    #[test]
    fn test_mark_enabled_and_disabled() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let store = HostStateStore::new(tmp.path().join("state").join("services.json"));

        store
            .mark_enabled("usg", EnabledService::new(None, false))
            .expect("mark_enabled should succeed");
        store
            .mark_enabled("fips", EnabledService::new(Some("updates".to_string()), false))
            .expect("mark_enabled should succeed");

        let state = store.load().expect("load should succeed");
        assert_eq!(
            state.enabled_names().into_iter().collect::<Vec<_>>(),
            vec!["fips".to_string(), "usg".to_string()]
        );
        assert_eq!(
            state.services["fips"].variant.as_deref(),
            Some("updates")
        );

        assert!(store.mark_disabled("usg").expect("mark_disabled should succeed"));
        assert!(!store.mark_disabled("usg").expect("mark_disabled should succeed"));
        assert!(!store.load().expect("load should succeed").is_enabled("usg"));
    }

    #[test]
    fn test_save_leaves_no_tmp_files() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let store = HostStateStore::new(tmp.path().join("services.json"));
        for _ in 0..3 {
            store.save(&HostState::default()).expect("save should succeed");
        }
        let leftovers: Vec<_> = fs::read_dir(tmp.path())
            .expect("read_dir should succeed")
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_rejects_unknown_version() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let path = tmp.path().join("services.json");
        fs::write(&path, r#"{"version": 7, "services": {}}"#).expect("write should succeed");
        let err = HostStateStore::new(path)
            .load()
            .expect_err("unknown version should fail");
        assert!(err.to_string().contains("Unsupported host state version 7"));
    }
}
