// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task store: one file per task under `tasks/<id>.json` (`spec.md` §4.3).

use crate::atomic::atomic_write;
use crate::lock::with_default_lock;
use crate::paths::Paths;
use cp_core::{Clock, CommandPostError, Task, TaskAudit, TaskContextInfo, TaskId, TaskStatus};
use std::path::PathBuf;
use std::sync::Arc;

/// A partial update applied to an existing task. Every field left `None`
/// (or empty, for `extra`) is left untouched; this is a merge, not a
/// replace.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub status: Option<TaskStatus>,
    pub assigned_to: Option<Option<String>>,
    pub plan: Option<String>,
    pub progress: Option<String>,
    pub audit: Option<TaskAudit>,
    pub context: Option<TaskContextInfo>,
    pub extra: std::collections::HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub assigned_to: Option<String>,
    pub domain: Option<String>,
    pub feature: Option<String>,
}

impl TaskFilter {
    fn matches(&self, task: &Task) -> bool {
        if let Some(status) = self.status {
            if task.status != status {
                return false;
            }
        }
        if let Some(ref assigned_to) = self.assigned_to {
            if task.assigned_to.as_deref() != Some(assigned_to.as_str()) {
                return false;
            }
        }
        if let Some(ref domain) = self.domain {
            if &task.domain != domain {
                return false;
            }
        }
        if let Some(ref feature) = self.feature {
            if &task.feature != feature {
                return false;
            }
        }
        true
    }
}

pub struct TaskStore {
    paths: Paths,
    clock: Arc<dyn Clock>,
}

impl TaskStore {
    pub fn new(paths: Paths, clock: Arc<dyn Clock>) -> Self {
        Self { paths, clock }
    }

    fn path(&self, task_id: &str) -> PathBuf {
        self.paths.task(task_id)
    }

    fn read_file(&self, path: &PathBuf) -> Result<Task, CommandPostError> {
        let bytes = std::fs::read(path).map_err(|e| CommandPostError::FileSystem {
            file_path: path.clone(),
            cause: e.to_string(),
        })?;
        serde_json::from_slice(&bytes).map_err(|e| CommandPostError::FileSystem {
            file_path: path.clone(),
            cause: e.to_string(),
        })
    }

    fn write_file(&self, task: &Task) -> Result<(), CommandPostError> {
        let bytes = serde_json::to_vec_pretty(task).map_err(|e| CommandPostError::FileSystem {
            file_path: self.path(task.id.as_str()),
            cause: e.to_string(),
        })?;
        atomic_write(&self.path(task.id.as_str()), &bytes)
    }

    /// Creates a new task file. Errors with [`CommandPostError::Domain`] if
    /// a task with this id already exists — tasks are created once and
    /// mutated via `update_task` thereafter.
    pub async fn create_task(&self, task: Task) -> Result<Task, CommandPostError> {
        let path = self.path(task.id.as_str());
        with_default_lock(&path, move || -> Result<Task, CommandPostError> {
            if path.exists() {
                return Err(CommandPostError::domain(format!(
                    "task already exists: {}",
                    task.id
                )));
            }
            self.write_file(&task)?;
            Ok(task)
        })
        .await?
    }

    pub async fn get_task(&self, task_id: &str) -> Result<Option<Task>, CommandPostError> {
        let path = self.path(task_id);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(self.read_file(&path)?))
    }

    /// Applies `patch` to the stored task, always refreshing
    /// `timestamps.last_updated`, stamping `timestamps.started` the first
    /// time the status becomes `in_progress`, and stamping
    /// `timestamps.completed` the first time it becomes `completed`.
    pub async fn update_task(
        &self,
        task_id: &str,
        patch: TaskPatch,
    ) -> Result<Task, CommandPostError> {
        let path = self.path(task_id);
        if !path.exists() {
            return Err(CommandPostError::not_found("task", task_id));
        }
        with_default_lock(&path, || -> Result<Task, CommandPostError> {
            let mut task = self.read_file(&path)?;

            if let Some(status) = patch.status {
                task.status = status;
                if status == TaskStatus::InProgress && task.timestamps.started.is_none() {
                    task.timestamps.started = Some(self.clock.now());
                }
                if status == TaskStatus::Completed {
                    task.timestamps.completed = Some(self.clock.now());
                }
            }
            if let Some(assigned_to) = patch.assigned_to {
                task.assigned_to = assigned_to;
            }
            if let Some(plan) = patch.plan {
                task.plan = plan;
            }
            if let Some(progress) = patch.progress {
                task.progress = progress;
            }
            if let Some(audit) = patch.audit {
                task.audit = audit;
            }
            if let Some(context) = patch.context {
                task.context = context;
            }
            for (key, value) in patch.extra {
                task.extra.insert(key, value);
            }

            task.timestamps.last_updated = self.clock.now();
            self.write_file(&task)?;
            Ok(task)
        })
        .await?
    }

    /// Lists every task matching `filter`. Tasks whose file fails to parse
    /// are skipped rather than failing the whole listing, mirroring the
    /// event log's tolerance of individually-corrupt records.
    pub async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, CommandPostError> {
        let dir = self.paths.tasks_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut tasks = Vec::new();
        let entries = std::fs::read_dir(&dir).map_err(|e| CommandPostError::FileSystem {
            file_path: dir.clone(),
            cause: e.to_string(),
        })?;
        for entry in entries {
            let entry = entry.map_err(|e| CommandPostError::FileSystem {
                file_path: dir.clone(),
                cause: e.to_string(),
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Ok(task) = self.read_file(&path) {
                if filter.matches(&task) {
                    tasks.push(task);
                }
            }
        }
        tasks.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        Ok(tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cp_core::{FakeClock, TaskId};
    use tempfile::tempdir;

    fn store() -> (tempfile::TempDir, TaskStore, Arc<FakeClock>) {
        let dir = tempdir().unwrap();
        let clock = Arc::new(FakeClock::new(chrono::Utc::now()));
        let store = TaskStore::new(Paths::new(dir.path()), clock.clone());
        (dir, store, clock)
    }

    fn new_task(id: &str, clock: &FakeClock) -> Task {
        Task::new(TaskId::new(id), "Title", "feature-x", "backend", clock.now())
    }

    #[tokio::test]
    async fn create_then_get_roundtrip() {
        let (_dir, store, clock) = store();
        let task = new_task("task-1", &clock);
        store.create_task(task).await.unwrap();
        let fetched = store.get_task("task-1").await.unwrap().unwrap();
        assert_eq!(fetched.status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn create_task_rejects_duplicate_id() {
        let (_dir, store, clock) = store();
        store.create_task(new_task("task-1", &clock)).await.unwrap();
        let err = store.create_task(new_task("task-1", &clock)).await.unwrap_err();
        assert!(matches!(err, CommandPostError::Domain(_)));
    }

    #[tokio::test]
    async fn get_missing_task_returns_none() {
        let (_dir, store, _clock) = store();
        assert!(store.get_task("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_task_merges_fields_and_refreshes_last_updated() {
        let (_dir, store, clock) = store();
        store.create_task(new_task("task-1", &clock)).await.unwrap();
        let created_updated = store.get_task("task-1").await.unwrap().unwrap().timestamps.last_updated;

        clock.advance(1000);
        let patch = TaskPatch {
            plan: Some("do the thing".to_string()),
            ..Default::default()
        };
        let updated = store.update_task("task-1", patch).await.unwrap();
        assert_eq!(updated.plan, "do the thing");
        assert_eq!(updated.title, "Title");
        assert!(updated.timestamps.last_updated > created_updated);
    }

    #[tokio::test]
    async fn update_task_stamps_started_on_first_in_progress_only() {
        let (_dir, store, clock) = store();
        store.create_task(new_task("task-1", &clock)).await.unwrap();

        clock.advance(1000);
        let updated = store
            .update_task(
                "task-1",
                TaskPatch {
                    status: Some(TaskStatus::InProgress),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let started_at = updated.timestamps.started.unwrap();

        clock.advance(1000);
        store
            .update_task(
                "task-1",
                TaskPatch {
                    status: Some(TaskStatus::Blocked),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        clock.advance(1000);
        let reentered = store
            .update_task(
                "task-1",
                TaskPatch {
                    status: Some(TaskStatus::InProgress),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(reentered.timestamps.started.unwrap(), started_at);
    }

    #[tokio::test]
    async fn update_task_stamps_completed() {
        let (_dir, store, clock) = store();
        store.create_task(new_task("task-1", &clock)).await.unwrap();
        let updated = store
            .update_task(
                "task-1",
                TaskPatch {
                    status: Some(TaskStatus::Completed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(updated.timestamps.completed.is_some());
    }

    #[tokio::test]
    async fn update_task_merges_extra_fields_without_clobbering_others() {
        let (_dir, store, clock) = store();
        store.create_task(new_task("task-1", &clock)).await.unwrap();
        let mut extra = std::collections::HashMap::new();
        extra.insert("custom_flag".to_string(), serde_json::json!(true));
        store
            .update_task(
                "task-1",
                TaskPatch {
                    extra,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let mut more = std::collections::HashMap::new();
        more.insert("another".to_string(), serde_json::json!("value"));
        let updated = store
            .update_task(
                "task-1",
                TaskPatch {
                    extra: more,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.extra.get("custom_flag"), Some(&serde_json::json!(true)));
        assert_eq!(updated.extra.get("another"), Some(&serde_json::json!("value")));
    }

    #[tokio::test]
    async fn list_tasks_filters_by_status_and_domain() {
        let (_dir, store, clock) = store();
        store.create_task(new_task("task-1", &clock)).await.unwrap();
        store.create_task(new_task("task-2", &clock)).await.unwrap();
        store
            .update_task(
                "task-2",
                TaskPatch {
                    status: Some(TaskStatus::InProgress),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let in_progress = store
            .list_tasks(&TaskFilter {
                status: Some(TaskStatus::InProgress),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(in_progress.len(), 1);
        assert_eq!(in_progress[0].id, TaskId::new("task-2"));

        let backend = store
            .list_tasks(&TaskFilter {
                domain: Some("backend".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(backend.len(), 2);
    }

    #[tokio::test]
    async fn list_tasks_on_missing_dir_returns_empty() {
        let (_dir, store, _clock) = store();
        assert_eq!(store.list_tasks(&TaskFilter::default()).await.unwrap().len(), 0);
    }
}
