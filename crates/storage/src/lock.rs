// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-path advisory lock (`spec.md` §4.1).
//!
//! Exclusive execution of `op` with respect to any other holder on the
//! same machine using the same convention: an `flock`-style lock on a
//! sibling `.lock` file. Default policy: up to 10 retries with exponential
//! backoff between 50ms and 2000ms, stale-lock reclaim at 5s.

use crate::paths::Paths;
use cp_core::CommandPostError;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
pub struct LockConfig {
    pub max_retries: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub stale_after: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            max_retries: 10,
            base_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_millis(2000),
            stale_after: Duration::from_secs(5),
        }
    }
}

struct Held(File);

impl Drop for Held {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.0);
    }
}

fn open_lock_file(lock_path: &Path) -> std::io::Result<File> {
    if let Some(parent) = lock_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new()
        .create(true)
        .write(true)
        .open(lock_path)
}

fn is_stale(lock_path: &Path, stale_after: Duration) -> bool {
    let Ok(meta) = std::fs::metadata(lock_path) else {
        return false;
    };
    let Ok(modified) = meta.modified() else {
        return false;
    };
    SystemTime::now()
        .duration_since(modified)
        .map(|age| age > stale_after)
        .unwrap_or(false)
}

fn try_acquire(lock_path: &Path) -> std::io::Result<Held> {
    let file = open_lock_file(lock_path)?;
    FileExt::try_lock_exclusive(&file)?;
    // Touch the file so its mtime reflects the most recent holder —
    // this is the heartbeat the staleness check above reads.
    let _ = file.set_len(0);
    Ok(Held(file))
}

/// Reclaim a lock presumed stale by unlinking the old lock file (which
/// orphans any flock held on the now-unlinked inode) and re-acquiring a
/// fresh one in its place.
fn reclaim(lock_path: &Path) -> std::io::Result<Held> {
    let _ = std::fs::remove_file(lock_path);
    try_acquire(lock_path)
}

/// Run `op` while holding the exclusive lock on the file adjacent to
/// `target`. The caller must ensure `target` itself already exists.
pub async fn with_file_lock<R>(
    target: &Path,
    cfg: LockConfig,
    op: impl FnOnce() -> R,
) -> Result<R, CommandPostError> {
    let lock_path = Paths::lock_for(target);
    let mut backoff = cfg.base_backoff;

    for attempt in 0..=cfg.max_retries {
        match try_acquire(&lock_path) {
            Ok(held) => {
                let result = op();
                drop(held);
                return Ok(result);
            }
            Err(_) if is_stale(&lock_path, cfg.stale_after) => {
                warn!(path = %lock_path.display(), "reclaiming stale lock");
                match reclaim(&lock_path) {
                    Ok(held) => {
                        let result = op();
                        drop(held);
                        return Ok(result);
                    }
                    Err(e) => {
                        debug!(path = %lock_path.display(), error = %e, "stale reclaim failed, will retry");
                    }
                }
            }
            Err(e) => {
                debug!(path = %lock_path.display(), attempt, error = %e, "lock held, retrying");
            }
        }

        if attempt == cfg.max_retries {
            return Err(CommandPostError::LockTimeout(target.to_path_buf()));
        }

        tokio::time::sleep(backoff).await;
        backoff = std::cmp::min(backoff * 2, cfg.max_backoff);
    }

    Err(CommandPostError::LockTimeout(target.to_path_buf()))
}

/// Convenience wrapper using [`LockConfig::default`].
pub async fn with_default_lock<R>(
    target: &Path,
    op: impl FnOnce() -> R,
) -> Result<R, CommandPostError> {
    with_file_lock(target, LockConfig::default(), op).await
}

#[allow(dead_code)]
pub(crate) fn lock_path_for(target: &Path) -> PathBuf {
    Paths::lock_for(target)
}
