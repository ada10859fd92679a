// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task records and the status-transition table.
//!
//! The task store itself does not validate transitions (`spec.md` §4.3) —
//! callers (the CLI, the handoff manager, an orchestrator) call
//! [`TaskStatus::can_transition_to`] before writing a new status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

crate::define_id! {
    /// Unique identifier for a task, formatted `task-<int>`.
    pub struct TaskId;
}

/// The 12-state task status set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Assigned,
    Ready,
    InProgress,
    Blocked,
    ReadyForReview,
    InReview,
    NeedsRevision,
    Approved,
    Completed,
    Failed,
    Error,
}

impl TaskStatus {
    /// The fixed adjacency table from `spec.md` §4.3.
    fn allowed_targets(self) -> &'static [TaskStatus] {
        use TaskStatus::*;
        match self {
            Pending => &[Assigned, Ready, InProgress, ReadyForReview, Approved, Error, Failed],
            Assigned => &[Ready, InProgress, Pending, Blocked, ReadyForReview],
            Ready => &[InProgress, Pending, Error],
            InProgress => &[Blocked, ReadyForReview, Failed, Pending, Ready, Error, Approved],
            Blocked => &[InProgress, Failed, Pending],
            ReadyForReview => &[InReview, NeedsRevision, Approved, InProgress, Pending],
            InReview => &[Approved, NeedsRevision, ReadyForReview, InProgress],
            NeedsRevision => &[InProgress, ReadyForReview, Pending],
            Approved => &[Completed, InProgress, Pending],
            Completed => &[Pending, InProgress],
            Failed => &[Pending, InProgress, Ready],
            Error => &[Pending, InProgress, Ready],
        }
    }

    /// Whether moving from `self` to `target` is a legal transition.
    /// A status "transitioning" to itself is not in any adjacency list
    /// and is therefore rejected — callers that want a no-op write should
    /// short-circuit before calling this.
    pub fn can_transition_to(self, target: TaskStatus) -> bool {
        self.allowed_targets().contains(&target)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Assigned => "assigned",
            TaskStatus::Ready => "ready",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Blocked => "blocked",
            TaskStatus::ReadyForReview => "ready_for_review",
            TaskStatus::InReview => "in_review",
            TaskStatus::NeedsRevision => "needs_revision",
            TaskStatus::Approved => "approved",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// Audit metadata attached by the audit role.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskAudit {
    /// Compliance score in `[0, 1]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliance_score: Option<f64>,
}

/// Context-usage bookkeeping mirrored onto the task so status views don't
/// need to cross-reference the registry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskContextInfo {
    /// Usage fraction in `[0, 1]`.
    #[serde(default)]
    pub usage_percent: f64,
    #[serde(default)]
    pub handoff_count: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskTimestamps {
    pub created: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started: Option<DateTime<Utc>>,
    pub last_updated: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub feature: String,
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    pub status: TaskStatus,
    #[serde(default)]
    pub plan: String,
    #[serde(default)]
    pub progress: String,
    #[serde(default)]
    pub dependencies: Vec<TaskId>,
    #[serde(default)]
    pub audit: TaskAudit,
    #[serde(default)]
    pub context: TaskContextInfo,
    pub timestamps: TaskTimestamps,
    /// Free-form fields not otherwise modeled; merged by `updateTask`
    /// without being interpreted by the store.
    #[serde(default, flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl Task {
    pub fn new(
        id: TaskId,
        title: impl Into<String>,
        feature: impl Into<String>,
        domain: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            feature: feature.into(),
            domain: domain.into(),
            assigned_to: None,
            status: TaskStatus::Pending,
            plan: String::new(),
            progress: String::new(),
            dependencies: Vec::new(),
            audit: TaskAudit::default(),
            context: TaskContextInfo::default(),
            timestamps: TaskTimestamps {
                created: now,
                started: None,
                last_updated: now,
                completed: None,
            },
            extra: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[yare::parameterized(
        pending_to_assigned       = { TaskStatus::Pending, TaskStatus::Assigned, true },
        pending_to_in_review      = { TaskStatus::Pending, TaskStatus::InReview, false },
        assigned_to_blocked       = { TaskStatus::Assigned, TaskStatus::Blocked, true },
        assigned_to_completed     = { TaskStatus::Assigned, TaskStatus::Completed, false },
        ready_to_error            = { TaskStatus::Ready, TaskStatus::Error, true },
        in_progress_to_approved   = { TaskStatus::InProgress, TaskStatus::Approved, true },
        blocked_to_pending        = { TaskStatus::Blocked, TaskStatus::Pending, true },
        blocked_to_completed      = { TaskStatus::Blocked, TaskStatus::Completed, false },
        ready_for_review_to_review = { TaskStatus::ReadyForReview, TaskStatus::InReview, true },
        in_review_to_needs_revision = { TaskStatus::InReview, TaskStatus::NeedsRevision, true },
        needs_revision_to_pending = { TaskStatus::NeedsRevision, TaskStatus::Pending, true },
        approved_to_completed     = { TaskStatus::Approved, TaskStatus::Completed, true },
        completed_to_in_progress  = { TaskStatus::Completed, TaskStatus::InProgress, true },
        completed_to_failed       = { TaskStatus::Completed, TaskStatus::Failed, false },
        failed_to_ready           = { TaskStatus::Failed, TaskStatus::Ready, true },
        error_to_in_progress      = { TaskStatus::Error, TaskStatus::InProgress, true },
    )]
    fn transition_table(from: TaskStatus, to: TaskStatus, expected: bool) {
        assert_eq!(from.can_transition_to(to), expected);
    }

    #[test]
    fn no_status_transitions_to_itself() {
        use TaskStatus::*;
        for status in [
            Pending, Assigned, Ready, InProgress, Blocked, ReadyForReview, InReview,
            NeedsRevision, Approved, Completed, Failed, Error,
        ] {
            assert!(!status.can_transition_to(status), "{status} self-loop should be rejected");
        }
    }

    #[test]
    fn task_new_sets_pending_and_stamps_timestamps() {
        let now = Utc::now();
        let task = Task::new(TaskId::new("task-1"), "Title", "feature-x", "backend", now);
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.timestamps.created, now);
        assert_eq!(task.timestamps.last_updated, now);
    }
}
