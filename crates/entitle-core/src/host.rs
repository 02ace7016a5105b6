//! Facts about the host checked before any mutation.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub trait HostFacts {
    /// Whether the caller runs with elevated privilege.
    fn is_privileged(&self) -> bool;

    /// Whether the host is attached to a subscription.
    fn is_attached(&self) -> anyhow::Result<bool>;
}

/// Contents of `<state_dir>/attachment.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRecord {
    pub account: String,
    pub contract: String,
    pub attached_at: DateTime<Utc>,
}

/// Facts read from the running process and the state directory.
#[derive(Debug, Clone)]
pub struct SystemFacts {
    attachment_path: PathBuf,
}

impl SystemFacts {
    pub fn new(attachment_path: PathBuf) -> Self {
        Self { attachment_path }
    }

    pub fn attachment_path(&self) -> &Path {
        &self.attachment_path
    }

    /// The attachment record, if the host is attached.
    pub fn attachment(&self) -> anyhow::Result<Option<AttachmentRecord>> {
        if !self.attachment_path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&self.attachment_path).with_context(|| {
            format!(
                "Failed to read attachment file: {}",
                self.attachment_path.display()
            )
        })?;
        let record: AttachmentRecord = serde_json::from_slice(&bytes).with_context(|| {
            format!(
                "Failed to parse attachment file: {}",
                self.attachment_path.display()
            )
        })?;
        Ok(Some(record))
    }
}

impl HostFacts for SystemFacts {
    fn is_privileged(&self) -> bool {
        effective_uid_is_root()
    }

    fn is_attached(&self) -> anyhow::Result<bool> {
        Ok(self
            .attachment()?
            .map(|record| !record.contract.trim().is_empty())
            .unwrap_or(false))
    }
}

#[cfg(unix)]
fn effective_uid_is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
fn effective_uid_is_root() -> bool {
    false
}
