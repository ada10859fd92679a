// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: config, startup, shutdown.

mod reconcile;
pub use reconcile::Reconciler;

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use cp_adapters::TmuxSpawnExecutor;
use cp_core::{Clock, SystemClock, UuidIdGen};
use cp_engine::{ReplacementConfig, ReplacementCoordinator, SpawnExecutor};
use cp_storage::{AgentRegistry, EventLog, InboxStore, Paths, SnapshotStore, SpawnRequestStore, TaskStore};
use fs2::FileExt;
use thiserror::Error;
use tracing::info;

/// The coordinator type this daemon wires together, fixed to a real-time
/// clock and UUID-based ids.
pub type Coordinator = ReplacementCoordinator<UuidIdGen>;

/// Daemon configuration: fixed paths under the project's `.command-post/`
/// directory (`spec.md` §6), one daemon per project rather than the
/// teacher's single user-level daemon serving every project.
#[derive(Debug, Clone)]
pub struct Config {
    pub project_root: PathBuf,
    pub paths: Paths,
    pub lock_path: PathBuf,
    pub log_path: PathBuf,
    pub orchestrator_id: String,
    pub runner_cmd: Option<String>,
    pub poll_interval: std::time::Duration,
    pub snapshot_timeout: std::time::Duration,
}

impl Config {
    /// Load configuration for the project-level daemon.
    pub fn load() -> Result<Self, LifecycleError> {
        let project_root = crate::env::project_root();
        let paths = Paths::new(&project_root);
        Ok(Self {
            lock_path: paths.base().join("daemon.lock"),
            log_path: paths.base().join("daemon.log"),
            orchestrator_id: crate::env::orchestrator_id(),
            runner_cmd: crate::env::runner_cmd(),
            poll_interval: crate::env::poll_interval_ms().unwrap_or(std::time::Duration::from_secs(1)),
            snapshot_timeout: crate::env::snapshot_timeout_ms().unwrap_or(std::time::Duration::from_secs(600)),
            paths,
            project_root,
        })
    }
}

/// Daemon state during operation. The lock file is held for as long as
/// this value lives; dropping it releases the lock.
pub struct DaemonState {
    pub config: Config,
    #[allow(dead_code)]
    lock_file: File,
    pub coordinator: Arc<Coordinator>,
    pub reconciler: Arc<Reconciler<UuidIdGen>>,
    pub start_time: Instant,
}

/// Lifecycle errors.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DaemonState {
    pub fn shutdown(&self) -> Result<(), LifecycleError> {
        info!("shutting down daemon");
        if self.config.lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.lock_path) {
                tracing::warn!(error = %e, "failed to remove lock file");
            }
        }
        info!("daemon shutdown complete");
        Ok(())
    }
}

/// Start the daemon: acquire the single-instance lock, then wire the
/// replacement coordinator over the project's on-disk stores.
pub async fn startup(config: Config) -> Result<DaemonState, LifecycleError> {
    std::fs::create_dir_all(config.paths.base())?;

    // Acquire the lock before touching anything else, same ordering as the
    // teacher's daemon so a second `cpd` invocation fails fast rather than
    // racing the first on directory creation.
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)?;
    lock_file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;

    use std::io::Write;
    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    let lock_file = lock_file;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let id_gen = UuidIdGen;
    let paths = config.paths.clone();

    let spawn_executor: Arc<dyn SpawnExecutor> = match &config.runner_cmd {
        Some(cmd) => Arc::new(TmuxSpawnExecutor::new(cmd.clone())),
        None => Arc::new(TmuxSpawnExecutor::default()),
    };

    let coordinator = Arc::new(ReplacementCoordinator::new(
        AgentRegistry::new(paths.clone()),
        TaskStore::new(paths.clone(), clock.clone()),
        InboxStore::new(paths.clone(), Arc::new(SystemClock), UuidIdGen),
        EventLog::new(paths.clone()),
        SnapshotStore::new(paths.clone()),
        SpawnRequestStore::new(paths.clone()),
        spawn_executor,
        clock,
        id_gen,
        ReplacementConfig::new(config.project_root.display().to_string(), config.orchestrator_id.clone()),
    ));

    let reconciler = Arc::new(Reconciler::new(Arc::clone(&coordinator), config.snapshot_timeout));

    info!(project_root = %config.project_root.display(), "daemon started");

    Ok(DaemonState {
        config,
        lock_file,
        coordinator,
        reconciler,
        start_time: Instant::now(),
    })
}
