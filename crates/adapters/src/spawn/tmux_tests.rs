// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use cp_core::SnapshotId;
use serial_test::serial;
use std::sync::atomic::{AtomicU64, Ordering};

static SESSION_COUNTER: AtomicU64 = AtomicU64::new(0);

fn unique_id(suffix: &str) -> String {
    let id = SESSION_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("{suffix}-{id}")
}

fn request(replacement_agent_id: &str, project_path: &Path) -> SpawnRequestRecord {
    SpawnRequestRecord {
        request_id: format!("req-{replacement_agent_id}"),
        replacement_agent_id: replacement_agent_id.to_string(),
        original_agent_id: "worker-1".to_string(),
        instructions_path: "INSTRUCTIONS.md".to_string(),
        prepared_instructions: "read the snapshot".to_string(),
        snapshot: cp_core::MemorySnapshot {
            snapshot_id: SnapshotId::new("snap-1"),
            agent_id: "worker-1".to_string(),
            task_id: None,
            timestamp: chrono::Utc::now(),
            context_usage: Default::default(),
            decision_log: vec![],
            task_status: None,
            handoff_signal: None,
            memory_state: None,
            state: None,
            decisions: vec![],
            gotchas: vec![],
            files_state: None,
            next_steps: vec![],
            dependencies_discovered: vec![],
            handoff_number: 0,
            forced: false,
        },
        task_ids: vec![],
        role: "worker".to_string(),
        domain: "backend".to_string(),
        handoff_number: 1,
        project_path: project_path.display().to_string(),
        timestamp: chrono::Utc::now(),
    }
}

fn tmux_available() -> bool {
    std::process::Command::new("tmux")
        .arg("-V")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

macro_rules! skip_if_no_tmux {
    () => {
        if !tmux_available() {
            eprintln!("skipping: tmux not available");
            return;
        }
    };
}

#[tokio::test]
#[serial(tmux)]
async fn spawn_starts_a_detached_session() {
    skip_if_no_tmux!();
    let dir = tempfile::tempdir().unwrap();
    let id = unique_id("spawn");
    let executor = TmuxSpawnExecutor::new("sleep 60");

    let result = executor.spawn(&request(&id, dir.path())).await;
    assert!(result.success, "{:?}", result.error);

    let session_id = format!("cp-{id}");
    let _ = Command::new("tmux").args(["kill-session", "-t", &session_id]).output().await;
}

#[tokio::test]
#[serial(tmux)]
async fn spawn_replaces_an_existing_session_with_the_same_replacement_id() {
    skip_if_no_tmux!();
    let dir = tempfile::tempdir().unwrap();
    let id = unique_id("replace");
    let executor = TmuxSpawnExecutor::new("sleep 60");

    let first = executor.spawn(&request(&id, dir.path())).await;
    assert!(first.success);
    let second = executor.spawn(&request(&id, dir.path())).await;
    assert!(second.success);

    let session_id = format!("cp-{id}");
    let _ = Command::new("tmux").args(["kill-session", "-t", &session_id]).output().await;
}

#[tokio::test]
async fn spawn_rejects_nonexistent_project_path() {
    let executor = TmuxSpawnExecutor::new("sleep 1");
    let result = executor
        .spawn(&request("worker-1-r1", Path::new("/nonexistent/project/path")))
        .await;
    assert!(!result.success);
    assert!(result.error.unwrap().contains("does not exist"));
}

#[test]
fn command_for_substitutes_instructions_path() {
    let executor = TmuxSpawnExecutor::new("claude --resume-from {instructions}");
    let req = request("worker-1-r1", Path::new("/tmp"));
    assert_eq!(
        executor.command_for(&req),
        "claude --resume-from INSTRUCTIONS.md"
    );
}
