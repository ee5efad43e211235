//! Exclusive repository lock backed by a lock file

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::error::{LineageError, Result};

const RETRY_DELAY: Duration = Duration::from_millis(100);

/// A lock file nobody could parse is left alone for this long, since its
/// holder may still be writing it
const UNREADABLE_GRACE: Duration = Duration::from_secs(10);

/// Contents of the lock file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryLock {
    /// Lock holder identifier
    pub holder: String,
    pub pid: u32,
    pub acquired_at: DateTime<Utc>,
    /// Lock token for verification
    pub token: String,
}

impl RepositoryLock {
    fn new(holder: &str) -> Self {
        Self {
            holder: holder.to_string(),
            pid: std::process::id(),
            acquired_at: Utc::now(),
            token: Uuid::new_v4().to_string(),
        }
    }

    fn describe(&self) -> String {
        format!(
            "{} (pid {}, since {})",
            self.holder,
            self.pid,
            self.acquired_at.format("%Y-%m-%d %H:%M:%S UTC")
        )
    }
}

/// Held lock; the lock file is removed when this is dropped
#[derive(Debug)]
pub struct LockGuard {
    lock: RepositoryLock,
    lock_file: PathBuf,
}

impl LockGuard {
    /// Take the lock, failing at once if another live process holds it.
    ///
    /// A lock left behind by a process that no longer exists is removed and
    /// taken over.
    pub fn try_acquire(lock_file: &Path, holder: &str) -> Result<Self> {
        let mut reclaimed = false;
        let mut file = loop {
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(lock_file)
            {
                Ok(file) => break file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if !reclaimed && remove_stale_lock(lock_file)? {
                        reclaimed = true;
                        continue;
                    }
                    return Err(LineageError::RepositoryBusy {
                        lock_path: lock_file.to_path_buf(),
                        holder: current_holder(lock_file),
                    });
                }
                Err(e) => return Err(LineageError::Io(e)),
            }
        };

        let guard = Self {
            lock: RepositoryLock::new(holder),
            lock_file: lock_file.to_path_buf(),
        };
        // The guard exists from here on, so a failed write still removes the file
        let contents = serde_json::to_vec(&guard.lock)?;
        file.write_all(&contents)?;

        debug!("Acquired repository lock {}", lock_file.display());
        Ok(guard)
    }

    /// Take the lock, retrying until `wait` has elapsed
    pub async fn acquire(lock_file: &Path, holder: &str, wait: Option<Duration>) -> Result<Self> {
        let Some(wait) = wait else {
            return Self::try_acquire(lock_file, holder);
        };

        let deadline = tokio::time::Instant::now() + wait;
        loop {
            match Self::try_acquire(lock_file, holder) {
                Err(LineageError::RepositoryBusy { .. }) if tokio::time::Instant::now() < deadline => {
                    trace!("Repository lock busy, retrying");
                    tokio::time::sleep(RETRY_DELAY).await;
                }
                result => return result,
            }
        }
    }

    pub fn lock_info(&self) -> &RepositoryLock {
        &self.lock
    }

    pub fn path(&self) -> &Path {
        &self.lock_file
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.lock_file) {
            Ok(()) => debug!("Released repository lock {}", self.lock_file.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to remove lock file {}: {}",
                self.lock_file.display(),
                e
            ),
        }
    }
}

fn read_lock(lock_file: &Path) -> Option<RepositoryLock> {
    std::fs::read(lock_file)
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
}

/// Remove `lock_file` if its holder is gone; `Ok(true)` when it was removed
fn remove_stale_lock(lock_file: &Path) -> Result<bool> {
    let stale = match read_lock(lock_file) {
        Some(lock) if !is_process_running(lock.pid) => {
            warn!(
                "Removing stale repository lock held by {} (process no longer running)",
                lock.describe()
            );
            true
        }
        Some(_) => false,
        None => {
            let age = std::fs::metadata(lock_file)
                .and_then(|m| m.modified())
                .ok()
                .and_then(|modified| modified.elapsed().ok());
            match age {
                Some(age) if age > UNREADABLE_GRACE => {
                    warn!(
                        "Removing unreadable repository lock {} left {:?} ago",
                        lock_file.display(),
                        age
                    );
                    true
                }
                _ => false,
            }
        }
    };

    if !stale {
        return Ok(false);
    }
    match std::fs::remove_file(lock_file) {
        Ok(()) => Ok(true),
        // Another process reclaimed it first
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(true),
        Err(e) => Err(LineageError::Io(e)),
    }
}

/// Whether a process with this pid exists on this machine
pub fn is_process_running(pid: u32) -> bool {
    if pid == std::process::id() {
        return true;
    }

    #[cfg(target_os = "linux")]
    {
        Path::new("/proc").join(pid.to_string()).exists()
    }

    #[cfg(all(unix, not(target_os = "linux")))]
    {
        std::process::Command::new("kill")
            .arg("-0")
            .arg(pid.to_string())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(true)
    }

    #[cfg(not(unix))]
    {
        let _ = pid;
        true
    }
}

fn current_holder(lock_file: &Path) -> String {
    read_lock(lock_file)
        .map(|lock| lock.describe())
        .unwrap_or_else(|| "an unknown process".to_string())
}
