// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tmux-backed spawn executor: starts the replacement's runner script in a
//! new detached tmux session, the same way the teacher's session adapter
//! launches agent sessions. This adapter is deliberately thin: it does not
//! parse or render the instructions file, only points a shell at it.

use async_trait::async_trait;
use cp_engine::{SpawnExecutor, SpawnResult};
use cp_storage::SpawnRequestRecord;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Spawns replacement agents by starting a runner script under tmux.
///
/// `runner` is the command template run inside the session; `{instructions}`
/// is substituted with `request.instructions_path` before execution.
pub struct TmuxSpawnExecutor {
    runner: String,
}

impl Default for TmuxSpawnExecutor {
    fn default() -> Self {
        Self::new("claude --resume-from {instructions}")
    }
}

impl TmuxSpawnExecutor {
    pub fn new(runner: impl Into<String>) -> Self {
        Self { runner: runner.into() }
    }

    fn command_for(&self, request: &SpawnRequestRecord) -> String {
        self.runner.replace("{instructions}", &request.instructions_path)
    }
}

#[async_trait]
impl SpawnExecutor for TmuxSpawnExecutor {
    async fn spawn(&self, request: &SpawnRequestRecord) -> SpawnResult {
        let session_id = format!("cp-{}", request.replacement_agent_id);
        let cwd: PathBuf = if request.project_path.is_empty() {
            PathBuf::from(".")
        } else {
            PathBuf::from(&request.project_path)
        };

        if !Path::new(&cwd).exists() {
            return SpawnResult::failed(
                request.request_id.clone(),
                format!("project path does not exist: {}", cwd.display()),
            );
        }

        let existing = Command::new("tmux")
            .args(["has-session", "-t", &session_id])
            .output()
            .await;
        if existing.map(|o| o.status.success()).unwrap_or(false) {
            tracing::warn!(session_id, "replacement session already exists, killing first");
            let _ = Command::new("tmux").args(["kill-session", "-t", &session_id]).output().await;
        }

        let output = Command::new("tmux")
            .arg("new-session")
            .arg("-d")
            .arg("-s")
            .arg(&session_id)
            .arg("-c")
            .arg(&cwd)
            .arg(self.command_for(request))
            .output()
            .await;

        match output {
            Ok(output) if output.status.success() => {
                tracing::info!(session_id, request_id = %request.request_id, "spawned replacement session");
                SpawnResult::ok(request.request_id.clone())
            }
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr).to_string();
                tracing::error!(session_id, stderr = %stderr, "tmux spawn failed");
                SpawnResult::failed(request.request_id.clone(), stderr)
            }
            Err(error) => SpawnResult::failed(request.request_id.clone(), error.to_string()),
        }
    }
}

#[cfg(test)]
#[path = "tmux_tests.rs"]
mod tests;
