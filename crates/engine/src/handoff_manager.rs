// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Handoff Manager: a lightweight state machine tracking a single
//! in-flight handoff per source agent (`spec.md` §4.8).

use cp_core::{CommandPostError, TaskId};
use cp_storage::{TaskFilter, TaskPatch, TaskStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoffState {
    Initiated,
    SnapshotReady,
    Transferred,
    Completed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct Handoff {
    pub source_agent_id: String,
    pub target_agent_id: String,
    pub snapshot_id: String,
    pub state: HandoffState,
    pub transferred_task_ids: Vec<String>,
}

impl Handoff {
    pub fn new(source_agent_id: impl Into<String>, target_agent_id: impl Into<String>, snapshot_id: impl Into<String>) -> Self {
        Self {
            source_agent_id: source_agent_id.into(),
            target_agent_id: target_agent_id.into(),
            snapshot_id: snapshot_id.into(),
            state: HandoffState::Initiated,
            transferred_task_ids: Vec::new(),
        }
    }

    pub fn mark_snapshot_ready(&mut self) {
        self.state = HandoffState::SnapshotReady;
    }

    pub fn mark_failed(&mut self) {
        self.state = HandoffState::Failed;
    }
}

/// Reassigns every task whose `assigned_to` is `handoff.source_agent_id`
/// to `handoff.target_agent_id`. This is a reassignment, not a status
/// transition — a task's status is left untouched by the handoff itself.
pub async fn transfer_tasks(
    task_store: &TaskStore,
    handoff: &mut Handoff,
) -> Result<Vec<TaskId>, CommandPostError> {
    let filter = TaskFilter {
        assigned_to: Some(handoff.source_agent_id.clone()),
        ..Default::default()
    };
    let tasks = task_store.list_tasks(&filter).await?;

    let mut transferred = Vec::with_capacity(tasks.len());
    for task in tasks {
        task_store
            .update_task(
                task.id.as_str(),
                TaskPatch {
                    assigned_to: Some(Some(handoff.target_agent_id.clone())),
                    ..Default::default()
                },
            )
            .await?;
        transferred.push(task.id.clone());
    }

    handoff.transferred_task_ids = transferred.iter().map(|id| id.as_str().to_string()).collect();
    handoff.state = HandoffState::Transferred;
    Ok(transferred)
}

pub fn complete(handoff: &mut Handoff) {
    handoff.state = HandoffState::Completed;
}

#[cfg(test)]
mod tests {
    use super::*;
    use cp_core::{Clock, FakeClock, Task};
    use cp_storage::Paths;
    use std::sync::Arc;
    use tempfile::tempdir;

    async fn seeded_store() -> (tempfile::TempDir, TaskStore, Arc<FakeClock>) {
        let dir = tempdir().unwrap();
        let clock = Arc::new(FakeClock::new(chrono::Utc::now()));
        let store = TaskStore::new(Paths::new(dir.path()), clock.clone());

        let mut t1 = Task::new(TaskId::new("task-1"), "t1", "feature-x", "backend", clock.now());
        t1.assigned_to = Some("worker-1".into());
        store.create_task(t1).await.unwrap();

        let mut t2 = Task::new(TaskId::new("task-2"), "t2", "feature-x", "backend", clock.now());
        t2.assigned_to = Some("worker-1".into());
        store.create_task(t2).await.unwrap();

        let mut t3 = Task::new(TaskId::new("task-3"), "t3", "feature-x", "backend", clock.now());
        t3.assigned_to = Some("worker-2".into());
        store.create_task(t3).await.unwrap();

        (dir, store, clock)
    }

    #[tokio::test]
    async fn transfer_tasks_reassigns_only_source_agents_tasks() {
        let (_dir, store, _clock) = seeded_store().await;
        let mut handoff = Handoff::new("worker-1", "worker-1-r1", "snap-1");
        let transferred = transfer_tasks(&store, &mut handoff).await.unwrap();

        assert_eq!(transferred.len(), 2);
        assert_eq!(handoff.state, HandoffState::Transferred);

        let t1 = store.get_task("task-1").await.unwrap().unwrap();
        assert_eq!(t1.assigned_to.as_deref(), Some("worker-1-r1"));
        let t3 = store.get_task("task-3").await.unwrap().unwrap();
        assert_eq!(t3.assigned_to.as_deref(), Some("worker-2"));
    }

    #[test]
    fn complete_sets_terminal_state() {
        let mut handoff = Handoff::new("worker-1", "worker-1-r1", "snap-1");
        handoff.mark_snapshot_ready();
        complete(&mut handoff);
        assert_eq!(handoff.state, HandoffState::Completed);
    }
}
