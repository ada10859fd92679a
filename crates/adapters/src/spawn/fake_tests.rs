// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use cp_core::SnapshotId;

fn request(request_id: &str) -> SpawnRequestRecord {
    SpawnRequestRecord {
        request_id: request_id.to_string(),
        replacement_agent_id: "worker-1-r1".to_string(),
        original_agent_id: "worker-1".to_string(),
        instructions_path: "/project/agents/worker-1-r1/INSTRUCTIONS.md".to_string(),
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
        project_path: "/project".to_string(),
        timestamp: chrono::Utc::now(),
    }
}

#[tokio::test]
async fn defaults_to_success_and_records_requests() {
    let executor = FakeSpawnExecutor::new();
    let result = executor.spawn(&request("req-1")).await;
    assert!(result.success);
    assert_eq!(result.request_id, "req-1");

    let recorded = executor.requests();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].request_id, "req-1");
}

#[tokio::test]
async fn fail_with_scripts_failure_until_reset() {
    let executor = FakeSpawnExecutor::new();
    executor.fail_with("tmux not installed");

    let result = executor.spawn(&request("req-1")).await;
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("tmux not installed"));

    executor.succeed();
    let result = executor.spawn(&request("req-2")).await;
    assert!(result.success);
}

#[tokio::test]
async fn records_every_call_in_order() {
    let executor = FakeSpawnExecutor::new();
    executor.spawn(&request("req-1")).await;
    executor.spawn(&request("req-2")).await;

    let recorded = executor.requests();
    assert_eq!(recorded.len(), 2);
    assert_eq!(recorded[0].request_id, "req-1");
    assert_eq!(recorded[1].request_id, "req-2");
}
