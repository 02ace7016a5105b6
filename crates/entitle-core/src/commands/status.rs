//! Status command: enabled services as last recorded in the status cache.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::context::AppContext;
use crate::host::HostFacts;
use crate::lock::{LockHolder, LockManager};

#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatusEntry {
    pub name: String,
    pub title: Option<String>,
    pub enabled: bool,
    pub variant: Option<String>,
    pub access_only: bool,
    pub enabled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub attached: bool,
    pub account: Option<String>,
    pub refreshed_at: DateTime<Utc>,
    pub lock_holder: Option<LockHolder>,
    pub services: Vec<ServiceStatusEntry>,
}

impl StatusReport {
    pub fn enabled(&self) -> impl Iterator<Item = &ServiceStatusEntry> {
        self.services.iter().filter(|s| s.enabled)
    }
}

pub struct StatusCommand {
    ctx: AppContext,
}

impl StatusCommand {
    pub fn new(ctx: AppContext) -> Self {
        Self { ctx }
    }

    pub fn with_defaults() -> anyhow::Result<Self> {
        Ok(Self::new(AppContext::with_defaults()?))
    }

    /// Report every catalog service plus any enabled service the catalog no
    /// longer lists.
    pub fn execute(&self) -> anyhow::Result<StatusReport> {
        let snapshot = self.ctx.status_cache().current()?;
        let catalog = self.ctx.catalog()?;
        let facts = self.ctx.host_facts();
        let attachment = facts.attachment()?;

        let mut services: BTreeMap<String, ServiceStatusEntry> = catalog
            .service
            .iter()
            .map(|(name, definition)| {
                (
                    name.clone(),
                    ServiceStatusEntry {
                        name: name.clone(),
                        title: definition.title.clone(),
                        enabled: false,
                        variant: None,
                        access_only: false,
                        enabled_at: None,
                    },
                )
            })
            .collect();

        for (name, enabled) in &snapshot.services {
            let entry = services
                .entry(name.clone())
                .or_insert_with(|| ServiceStatusEntry {
                    name: name.clone(),
                    title: None,
                    enabled: false,
                    variant: None,
                    access_only: false,
                    enabled_at: None,
                });
            entry.enabled = true;
            entry.variant = enabled.variant.clone();
            entry.access_only = enabled.access_only;
            entry.enabled_at = Some(enabled.enabled_at);
        }

        Ok(StatusReport {
            attached: facts.is_attached()?,
            account: attachment.map(|a| a.account),
            refreshed_at: snapshot.refreshed_at,
            lock_holder: self.ctx.lock_manager().holder()?,
            services: services.into_values().collect(),
        })
    }
}
