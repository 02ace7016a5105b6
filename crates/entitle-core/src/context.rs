//! Application context for unified dependency injection.

use std::cell::OnceCell;
use std::path::{Path, PathBuf};

use crate::catalog::{Catalog, CatalogResolver, SystemCommandRunner, parse_catalog};
use crate::config::paths::{
    ATTACHMENT_FILE, CATALOG_FILE, HOST_STATE_FILE, LOCK_FILE, STATUS_CACHE_FILE,
    default_config_path, default_state_dir, resolve_relative,
};
use crate::config::{EntitleConfig, parse_config};
use crate::entitlement::{Activation, EntitlementResolver};
use crate::error::EnableError;
use crate::host::SystemFacts;
use crate::lock::FileLockManager;
use crate::orchestration::EnablePolicy;
use crate::state::HostStateStore;
use crate::status::FileStatusCache;

/// Resolved configuration plus factories for every collaborator.
///
/// Frontends create this once and pass it to commands.
#[derive(Debug, Clone)]
pub struct AppContext {
    config: EntitleConfig,
    config_dir: PathBuf,
    state_dir: PathBuf,
    catalog_path: PathBuf,
}

impl AppContext {
    /// Create a context with explicit locations.
    pub fn new(config: EntitleConfig, config_dir: PathBuf, state_dir: PathBuf) -> Self {
        let catalog_path = config
            .catalog
            .as_deref()
            .map(|path| resolve_relative(&config_dir, path))
            .unwrap_or_else(|| config_dir.join(CATALOG_FILE));
        Self {
            config,
            config_dir,
            state_dir,
            catalog_path,
        }
    }

    /// Load `config_path` (or the default config file, if it exists).
    ///
    /// `state_dir` overrides both the config file and the default location.
    pub fn load(config_path: Option<&Path>, state_dir: Option<PathBuf>) -> anyhow::Result<Self> {
        let config_path = match config_path {
            Some(path) => path.to_path_buf(),
            None => default_config_path()?,
        };
        let config = if config_path.exists() {
            parse_config(&config_path)?
        } else {
            tracing::debug!(path = %config_path.display(), "no config file, using defaults");
            EntitleConfig::default()
        };
        let config_dir = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let state_dir = match state_dir.or_else(|| config.state_dir.clone()) {
            Some(dir) => resolve_relative(&config_dir, &dir),
            None => default_state_dir()?,
        };

        Ok(Self::new(config, config_dir, state_dir))
    }

    pub fn with_defaults() -> anyhow::Result<Self> {
        Self::load(None, None)
    }

    pub fn config(&self) -> &EntitleConfig {
        &self.config
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn catalog_path(&self) -> &Path {
        &self.catalog_path
    }

    pub fn policy(&self) -> EnablePolicy {
        self.config.api.policy()
    }

    pub fn lock_manager(&self) -> FileLockManager {
        FileLockManager::new(self.state_dir.join(LOCK_FILE))
    }

    pub fn host_state(&self) -> HostStateStore {
        HostStateStore::new(self.state_dir.join(HOST_STATE_FILE))
    }

    pub fn status_cache(&self) -> FileStatusCache {
        FileStatusCache::new(self.host_state(), self.state_dir.join(STATUS_CACHE_FILE))
    }

    pub fn host_facts(&self) -> SystemFacts {
        SystemFacts::new(self.state_dir.join(ATTACHMENT_FILE))
    }

    /// Load the service catalog; a missing catalog is empty.
    pub fn catalog(&self) -> anyhow::Result<Catalog> {
        if !self.catalog_path.exists() {
            tracing::warn!(path = %self.catalog_path.display(), "service catalog not found");
            return Ok(Catalog::default());
        }
        parse_catalog(&self.catalog_path)
    }

    /// Resolver over the catalog, running commands as child processes.
    pub fn resolver(&self) -> anyhow::Result<CatalogResolver> {
        Ok(CatalogResolver::new(
            self.catalog()?,
            self.host_state(),
            Box::new(SystemCommandRunner),
        ))
    }

    /// Resolver that defers loading the catalog until the first resolution.
    pub fn lazy_resolver(&self) -> LazyCatalogResolver<'_> {
        LazyCatalogResolver {
            ctx: self,
            loaded: OnceCell::new(),
        }
    }
}

/// Catalog resolver built on first use.
///
/// The orchestrator only resolves after preconditions pass and the lock is
/// held, so a broken catalog never masks a precondition failure.
pub struct LazyCatalogResolver<'a> {
    ctx: &'a AppContext,
    loaded: OnceCell<CatalogResolver>,
}

impl LazyCatalogResolver<'_> {
    fn get(&self) -> anyhow::Result<&CatalogResolver> {
        if let Some(resolver) = self.loaded.get() {
            return Ok(resolver);
        }
        let resolver = self.ctx.resolver()?;
        Ok(self.loaded.get_or_init(|| resolver))
    }
}

impl EntitlementResolver for LazyCatalogResolver<'_> {
    fn resolve(
        &self,
        service: &str,
        variant: Option<&str>,
        access_only: bool,
    ) -> Result<Box<dyn Activation + '_>, EnableError> {
        self.get()?.resolve(service, variant, access_only)
    }
}
