//! File-backed lock manager.
//!
//! The lock is a single file created with `create_new`, so only one process
//! (or thread) can create it. It contains a JSON [`LockRecord`]. A record whose
//! pid is no longer running is stale, as is a file that stayed unparseable for
//! longer than a grace period. Stale locks are taken over on the next attempt.
//!
//! Takeovers are serialized through an advisory `flock` on `<lock>.takeover`,
//! and a stale file is only removed if it still holds what the contender read.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use tracing::{debug, warn};

use super::types::{LockAttempt, LockHolder, LockRecord};
use super::LockManager;

/// How long an unparseable lock file may exist before it counts as stale.
pub const DEFAULT_UNREADABLE_GRACE: Duration = Duration::from_secs(10);

/// Lock stored at a fixed path, usually `<state_dir>/lock`.
#[derive(Debug, Clone)]
pub struct FileLockManager {
    path: PathBuf,
    unreadable_grace: Duration,
}

impl FileLockManager {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            unreadable_grace: DEFAULT_UNREADABLE_GRACE,
        }
    }

    pub fn with_unreadable_grace(mut self, grace: Duration) -> Self {
        self.unreadable_grace = grace;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn takeover_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "lock".into());
        name.push(".takeover");
        self.path.with_file_name(name)
    }

    /// Read the current record.
    ///
    /// A file that exists but cannot be parsed is reported as unreadable:
    /// its creator may still be writing the record.
    fn read_record(&self) -> anyhow::Result<StoredLock> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(StoredLock::Missing),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("Failed to read lock file: {}", self.path.display()));
            }
        };
        Ok(match serde_json::from_slice(&bytes) {
            Ok(record) => StoredLock::Record(record),
            Err(_) => StoredLock::Unreadable,
        })
    }

    /// Whether the lock file has been unparseable for longer than the grace period.
    fn unreadable_expired(&self) -> anyhow::Result<bool> {
        let modified = match fs::metadata(&self.path).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(false),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("Failed to stat lock file: {}", self.path.display()));
            }
        };
        Ok(modified
            .elapsed()
            .map(|age| age >= self.unreadable_grace)
            .unwrap_or(false))
    }

    fn is_stale(&self, stored: &StoredLock) -> anyhow::Result<bool> {
        Ok(match stored {
            StoredLock::Missing => false,
            StoredLock::Unreadable => self.unreadable_expired()?,
            StoredLock::Record(record) => !process_alive(record.pid),
        })
    }

    /// Replace the stale lock `seen` with one held by `holder`.
    fn take_over(&self, seen: &StoredLock, holder: &str) -> anyhow::Result<LockAttempt> {
        let _serial = TakeoverGuard::acquire(&self.takeover_path())?;

        let current = self.read_record()?;
        let unchanged = match (&current, seen) {
            (StoredLock::Missing, _) => return self.create_or_held(holder),
            (StoredLock::Record(current), StoredLock::Record(seen)) => current == seen,
            (StoredLock::Unreadable, StoredLock::Unreadable) => self.unreadable_expired()?,
            _ => false,
        };
        if !unchanged {
            // Someone else took over first.
            return Ok(LockAttempt::Held(current.holder()));
        }

        match seen {
            StoredLock::Record(record) => warn!(
                holder = %record.holder,
                pid = record.pid,
                "clearing stale lock left by a dead process"
            ),
            _ => warn!(path = %self.path.display(), "clearing unreadable stale lock"),
        }
        self.remove()?;
        self.create_or_held(holder)
    }

    fn create_or_held(&self, holder: &str) -> anyhow::Result<LockAttempt> {
        if self.create(holder)? {
            Ok(LockAttempt::Acquired)
        } else {
            Ok(LockAttempt::Held(self.read_record()?.holder()))
        }
    }

    fn create(&self, holder: &str) -> anyhow::Result<bool> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create lock directory: {}", parent.display())
            })?;
        }

        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => return Ok(false),
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("Failed to create lock file: {}", self.path.display())
                });
            }
        };

        let record = LockRecord::current(holder);
        let bytes = serde_json::to_vec(&record).context("Failed to serialize lock record")?;
        file.write_all(&bytes)
            .and_then(|_| file.flush())
            .with_context(|| format!("Failed to write lock file: {}", self.path.display()))?;
        Ok(true)
    }

    fn remove(&self) -> anyhow::Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err)
                .with_context(|| format!("Failed to remove lock file: {}", self.path.display())),
        }
    }
}

impl LockManager for FileLockManager {
    fn try_acquire(&self, holder: &str) -> anyhow::Result<LockAttempt> {
        if self.create(holder)? {
            return Ok(LockAttempt::Acquired);
        }

        let stored = self.read_record()?;
        match stored {
            // Removed between our create and read; try once more.
            StoredLock::Missing => self.create_or_held(holder),
            _ if self.is_stale(&stored)? => self.take_over(&stored, holder),
            _ => Ok(LockAttempt::Held(stored.holder())),
        }
    }

    fn release(&self, holder: &str) -> anyhow::Result<()> {
        match self.read_record()? {
            StoredLock::Missing => Ok(()),
            StoredLock::Record(record)
                if record.holder != holder || !record.is_owned_by_current_process() => {
                debug!(
                    holder,
                    current_holder = %record.holder,
                    pid = record.pid,
                    "lock owned by another operation, leaving it"
                );
                Ok(())
            }
            StoredLock::Record(_) | StoredLock::Unreadable => {
                self.remove()?;
                debug!(holder, "lock released");
                Ok(())
            }
        }
    }

    fn clear_if_present(&self) -> anyhow::Result<()> {
        if self.remove()? {
            debug!(path = %self.path.display(), "lock cleared");
        }
        Ok(())
    }

    fn holder(&self) -> anyhow::Result<Option<LockHolder>> {
        Ok(match self.read_record()? {
            StoredLock::Missing => None,
            StoredLock::Record(record) => Some(LockHolder::from(&record)),
            StoredLock::Unreadable => Some(unknown_holder()),
        })
    }
}

enum StoredLock {
    Missing,
    Unreadable,
    Record(LockRecord),
}

impl StoredLock {
    fn holder(&self) -> LockHolder {
        match self {
            StoredLock::Record(record) => LockHolder::from(record),
            StoredLock::Missing | StoredLock::Unreadable => unknown_holder(),
        }
    }
}

/// Exclusive advisory lock on the takeover file, dropped with the file handle.
struct TakeoverGuard {
    _file: File,
}

impl TakeoverGuard {
    fn acquire(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create lock directory: {}", parent.display())
            })?;
        }
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("Failed to open takeover file: {}", path.display()))?;
        flock_exclusive(&file)
            .with_context(|| format!("Failed to lock takeover file: {}", path.display()))?;
        Ok(Self { _file: file })
    }
}

#[cfg(unix)]
fn flock_exclusive(file: &File) -> std::io::Result<()> {
    use std::os::fd::AsRawFd;

    loop {
        if unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) } == 0 {
            return Ok(());
        }
        let err = std::io::Error::last_os_error();
        if err.kind() != ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

#[cfg(not(unix))]
fn flock_exclusive(_file: &File) -> std::io::Result<()> {
    Ok(())
}

fn unknown_holder() -> LockHolder {
    LockHolder {
        holder: "unknown".to_string(),
        pid: 0,
    }
}

#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    if pid <= 0 {
        return false;
    }
    // Signal 0 only checks that the process exists and may be signalled.
    if unsafe { libc::kill(pid, 0) } == 0 {
        return true;
    }
    std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
fn process_alive(_pid: u32) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_acquire_writes_record() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let locks = FileLockManager::new(tmp.path().join("state").join("lock"));

        let attempt = locks.try_acquire("holder-a").expect("attempt should succeed");
        assert_eq!(attempt, LockAttempt::Acquired);

        let bytes = fs::read(locks.path()).expect("lock file should exist");
        let record: LockRecord = serde_json::from_slice(&bytes).expect("record should parse");
        assert_eq!(record.holder, "holder-a");
        assert_eq!(record.pid, std::process::id());
    }

    #[test]
    fn test_second_attempt_sees_holder() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let locks = FileLockManager::new(tmp.path().join("lock"));
        locks.try_acquire("holder-a").expect("attempt should succeed");

        let attempt = locks.try_acquire("holder-b").expect("attempt should succeed");
        assert_eq!(
            attempt,
            LockAttempt::Held(LockHolder {
                holder: "holder-a".to_string(),
                pid: std::process::id(),
            })
        );
    }

    #[test]
    fn test_release_ignores_other_holder() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let locks = FileLockManager::new(tmp.path().join("lock"));
        locks.try_acquire("holder-a").expect("attempt should succeed");

        locks.release("holder-b").expect("release should succeed");
        assert!(locks.path().exists());

        locks.release("holder-a").expect("release should succeed");
        assert!(!locks.path().exists());
    }

    #[test]
    fn test_stale_lock_is_cleared() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let locks = FileLockManager::new(tmp.path().join("lock"));
        let stale = LockRecord {
            pid: u32::MAX,
            holder: "crashed".to_string(),
            acquired_at: chrono::Utc::now(),
        };
        fs::write(
            locks.path(),
            serde_json::to_vec(&stale).expect("serialize should succeed"),
        )
        .expect("write should succeed");

        let attempt = locks.try_acquire("fresh").expect("attempt should succeed");
        assert_eq!(attempt, LockAttempt::Acquired);
        let holder = locks.holder().expect("holder should load").expect("lock should be held");
        assert_eq!(holder.holder, "fresh");
    }

    #[test]
    fn test_unparseable_lock_counts_as_held() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let locks = FileLockManager::new(tmp.path().join("lock"));
        fs::write(locks.path(), b"").expect("write should succeed");

        let attempt = locks.try_acquire("fresh").expect("attempt should succeed");
        assert!(matches!(attempt, LockAttempt::Held(h) if h.pid == 0));

        locks.clear_if_present().expect("clear should succeed");
        locks.clear_if_present().expect("second clear should succeed");
        assert!(locks.holder().expect("holder should load").is_none());
    }

    #[test]
    fn test_expired_unparseable_lock_is_taken_over() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let locks = FileLockManager::new(tmp.path().join("lock"))
            .with_unreadable_grace(Duration::ZERO);
        fs::write(locks.path(), b"").expect("write should succeed");

        let attempt = locks.try_acquire("fresh").expect("attempt should succeed");
        assert_eq!(attempt, LockAttempt::Acquired);
        let holder = locks.holder().expect("holder should load").expect("lock should be held");
        assert_eq!(holder.holder, "fresh");
        assert_eq!(holder.pid, std::process::id());
    }

    #[test]
    fn test_stale_lock_has_single_successor() {
        use std::sync::{Arc, Barrier};

        const CONTENDERS: usize = 8;

        let tmp = TempDir::new().expect("tempdir should succeed");
        let path = tmp.path().join("lock");

        for round in 0..50 {
            let stale = LockRecord {
                pid: u32::MAX,
                holder: format!("crashed-{round}"),
                acquired_at: chrono::Utc::now(),
            };
            fs::write(&path, serde_json::to_vec(&stale).expect("serialize should succeed"))
                .expect("write should succeed");

            let barrier = Arc::new(Barrier::new(CONTENDERS));
            let handles: Vec<_> = (0..CONTENDERS)
                .map(|id| {
                    let barrier = Arc::clone(&barrier);
                    let locks = FileLockManager::new(path.clone());
                    std::thread::spawn(move || {
                        let holder = format!("contender-{id}");
                        barrier.wait();
                        let attempt = locks.try_acquire(&holder).expect("attempt should succeed");
                        (holder, attempt)
                    })
                })
                .collect();

            let winners: Vec<String> = handles
                .into_iter()
                .map(|handle| handle.join().expect("contender should not panic"))
                .filter(|(_, attempt)| *attempt == LockAttempt::Acquired)
                .map(|(holder, _)| holder)
                .collect();
            assert_eq!(winners.len(), 1, "round {round}: winners {winners:?}");

            let locks = FileLockManager::new(path.clone());
            let current = locks.holder().expect("holder should load").expect("lock should be held");
            assert_eq!(current.holder, winners[0], "round {round}");
            locks.clear_if_present().expect("clear should succeed");
        }
    }
}
