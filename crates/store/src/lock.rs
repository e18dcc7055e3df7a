// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Swarm lock: a machine-scope filesystem mutex
//!
//! Serializes mutations of the claims/completions tables and epic/task id
//! allocation. The lock is an exclusive-create file containing the holder's
//! PID. Recovery from crashed holders: a lock whose PID is dead, or whose
//! file is at least [`STALE_AGE`] old, is unlinked and the create retried.
//! Not reentrant: a holder must not call back into the lock.

use crate::proc::pid_alive;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// A lock file this old is stale regardless of its PID.
pub const STALE_AGE: Duration = Duration::from_secs(10);

/// Delay between acquisition attempts.
pub const RETRY_DELAY: Duration = Duration::from_millis(100);

/// Attempts before giving up (≈5 s of waiting).
pub const MAX_RETRIES: u32 = 50;

/// Errors from lock acquisition
#[derive(Debug, Error)]
pub enum LockError {
    #[error("timed out waiting for swarm lock")]
    Timeout,
    #[error("cancelled while waiting for swarm lock")]
    Cancelled,
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Held swarm lock. Dropping unlinks the lock file (best effort).
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Whether an existing lock file can be reclaimed.
fn is_stale(path: &Path) -> bool {
    let age_expired = fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|m| m.elapsed().ok())
        .is_some_and(|age| age >= STALE_AGE);
    if age_expired {
        return true;
    }
    // An unreadable or half-written body is not proof of death; the age
    // rule above recovers those.
    match fs::read_to_string(path) {
        Ok(body) => match body.trim().parse::<u32>() {
            Ok(pid) => !pid_alive(pid),
            Err(_) => false,
        },
        Err(_) => false,
    }
}

/// Acquire the swarm lock, retrying per the stale-recovery protocol.
pub async fn acquire(
    path: &Path,
    cancel: Option<&CancellationToken>,
) -> Result<LockGuard, LockError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    for attempt in 0..MAX_RETRIES {
        if cancel.is_some_and(|c| c.is_cancelled()) {
            return Err(LockError::Cancelled);
        }
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(mut file) => {
                write!(file, "{}", std::process::id())?;
                return Ok(LockGuard {
                    path: path.to_path_buf(),
                });
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                if is_stale(path) {
                    tracing::debug!(path = %path.display(), attempt, "removing stale swarm lock");
                    let _ = fs::remove_file(path);
                    continue;
                }
                match cancel {
                    Some(token) => tokio::select! {
                        _ = token.cancelled() => return Err(LockError::Cancelled),
                        _ = tokio::time::sleep(RETRY_DELAY) => {}
                    },
                    None => tokio::time::sleep(RETRY_DELAY).await,
                }
            }
            Err(e) => return Err(LockError::Io(e)),
        }
    }
    Err(LockError::Timeout)
}

/// Run `f` while holding the swarm lock.
pub async fn with_swarm_lock<T>(
    path: &Path,
    cancel: Option<&CancellationToken>,
    f: impl FnOnce() -> T,
) -> Result<T, LockError> {
    let guard = acquire(path, cancel).await?;
    let result = f();
    drop(guard);
    Ok(result)
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
