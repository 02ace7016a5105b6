//! Default file locations.

use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "entitle.toml";
pub const CATALOG_FILE: &str = "catalog.toml";
pub const LOCK_FILE: &str = "lock";
pub const HOST_STATE_FILE: &str = "services.json";
pub const STATUS_CACHE_FILE: &str = "status.json";
pub const ATTACHMENT_FILE: &str = "attachment.json";

/// `<config_dir>/entitle`, e.g. `~/.config/entitle`.
pub fn default_config_dir() -> anyhow::Result<PathBuf> {
    let base = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
    Ok(base.join("entitle"))
}

pub fn default_config_path() -> anyhow::Result<PathBuf> {
    Ok(default_config_dir()?.join(CONFIG_FILE))
}

/// State directory holding the lock, host state, status cache and attachment.
///
/// - Unix: `$XDG_STATE_HOME/entitle` (fallback: local data dir)
/// - Windows: `%LOCALAPPDATA%\entitle`
pub fn default_state_dir() -> anyhow::Result<PathBuf> {
    let base = if cfg!(unix) {
        dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .ok_or_else(|| anyhow::anyhow!("Cannot determine state directory"))?
    } else {
        dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Cannot determine local app data directory"))?
    };
    Ok(base.join("entitle"))
}

/// Resolve a possibly relative path against the directory of the config file.
pub fn resolve_relative(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}
