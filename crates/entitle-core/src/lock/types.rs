//! Lock record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Contents of the lock file while a mutating operation is running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    pub pid: u32,
    pub holder: String,
    pub acquired_at: DateTime<Utc>,
}

impl LockRecord {
    /// Record for the current process.
    pub fn current(holder: &str) -> Self {
        Self {
            pid: std::process::id(),
            holder: holder.to_string(),
            acquired_at: Utc::now(),
        }
    }

    pub fn is_owned_by_current_process(&self) -> bool {
        self.pid == std::process::id()
    }
}

/// Who holds the lock, as reported to a caller that could not get it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockHolder {
    pub holder: String,
    pub pid: u32,
}

impl From<&LockRecord> for LockHolder {
    fn from(record: &LockRecord) -> Self {
        Self {
            holder: record.holder.clone(),
            pid: record.pid,
        }
    }
}

/// Result of a single acquisition attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockAttempt {
    Acquired,
    Held(LockHolder),
}
