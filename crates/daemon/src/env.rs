// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;
use std::time::Duration;

/// Resolve the project root this daemon instance serves: `CP_PROJECT_ROOT`,
/// falling back to the current working directory. Unlike the teacher's
/// single user-level daemon, `cpd` serves one project and its state lives
/// under that project's `.command-post/` (`spec.md` §6), not `$XDG_STATE_HOME`.
pub fn project_root() -> PathBuf {
    std::env::var("CP_PROJECT_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

/// Reconciliation poll interval override (default: 1000ms).
pub fn poll_interval_ms() -> Option<Duration> {
    std::env::var("CP_POLL_INTERVAL_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Snapshot wait timeout before a watched flow is force-handed-off
/// (default: 10 minutes).
pub fn snapshot_timeout_ms() -> Option<Duration> {
    std::env::var("CP_SNAPSHOT_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Orchestrator agent id that receives replacement reports (default: "orchestrator").
pub fn orchestrator_id() -> String {
    std::env::var("CP_ORCHESTRATOR_ID").unwrap_or_else(|_| "orchestrator".to_string())
}

/// Runner command template passed to [`cp_adapters::TmuxSpawnExecutor`].
pub fn runner_cmd() -> Option<String> {
    std::env::var("CP_RUNNER_CMD").ok()
}
