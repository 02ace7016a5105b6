//! Host-wide mutual exclusion for mutating operations.
//!
//! All operations that change host state share one lock. [`RetryLock`]
//! retries acquisition for a bounded window and hands out a [`LockGuard`]
//! that releases the lock when dropped, including during unwinding.

pub mod store;
pub mod types;

use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::EnableError;

pub use store::FileLockManager;
pub use types::{LockAttempt, LockHolder, LockRecord};

/// Default pause between acquisition attempts.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Default number of retries after the first failed attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 12;

/// A named, host-wide lock.
pub trait LockManager {
    /// Make one attempt to take the lock for `holder`.
    fn try_acquire(&self, holder: &str) -> anyhow::Result<LockAttempt>;

    /// Release the lock taken by `holder`. Releasing a lock that is not held is a no-op.
    fn release(&self, holder: &str) -> anyhow::Result<()>;

    /// Remove the lock unconditionally.
    fn clear_if_present(&self) -> anyhow::Result<()>;

    /// Current holder, if any.
    fn holder(&self) -> anyhow::Result<Option<LockHolder>>;
}

/// Acquisition policy: how long to keep retrying a held lock.
#[derive(Debug, Clone)]
pub struct RetryLock {
    holder: String,
    retry_interval: Duration,
    max_retries: u32,
}

impl RetryLock {
    pub fn new(holder: impl Into<String>) -> Self {
        Self {
            holder: holder.into(),
            retry_interval: DEFAULT_RETRY_INTERVAL,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn holder(&self) -> &str {
        &self.holder
    }

    /// Acquire the lock, retrying while another operation holds it.
    ///
    /// Fails with [`EnableError::LockHeld`] once `max_retries` retries are used up.
    pub fn acquire<'a>(&self, manager: &'a dyn LockManager) -> Result<LockGuard<'a>, EnableError> {
        let mut retries = 0;
        loop {
            match manager.try_acquire(&self.holder)? {
                LockAttempt::Acquired => {
                    debug!(holder = %self.holder, retries, "lock acquired");
                    return Ok(LockGuard {
                        manager,
                        holder: self.holder.clone(),
                        released: false,
                    });
                }
                LockAttempt::Held(current) => {
                    if retries >= self.max_retries {
                        warn!(
                            holder = %self.holder,
                            current_holder = %current.holder,
                            pid = current.pid,
                            "giving up waiting for lock"
                        );
                        return Err(EnableError::LockHeld {
                            holder: current.holder,
                            pid: current.pid,
                        });
                    }
                    retries += 1;
                    debug!(
                        current_holder = %current.holder,
                        pid = current.pid,
                        retries,
                        "lock held, retrying"
                    );
                    thread::sleep(self.retry_interval);
                }
            }
        }
    }
}

/// Scoped ownership of the host-wide lock. Dropping the guard releases it.
pub struct LockGuard<'a> {
    manager: &'a dyn LockManager,
    holder: String,
    released: bool,
}

impl LockGuard<'_> {
    pub fn holder(&self) -> &str {
        &self.holder
    }

    /// Release now and report any failure to do so.
    ///
    /// On failure the guard still falls back to its `Drop` cleanup.
    pub fn release(mut self) -> anyhow::Result<()> {
        self.manager.release(&self.holder)?;
        self.released = true;
        Ok(())
    }

    /// Remove the lock unconditionally while still owning it.
    pub fn clear(mut self) -> anyhow::Result<()> {
        self.manager.clear_if_present()?;
        self.released = true;
        Ok(())
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(err) = self.manager.release(&self.holder) {
            warn!(holder = %self.holder, error = %err, "failed to release lock, clearing it");
            if let Err(err) = self.manager.clear_if_present() {
                warn!(error = %err, "failed to clear lock");
            }
        }
    }
}
