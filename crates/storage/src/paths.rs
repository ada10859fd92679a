// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Path layout: pure functions of `(projectRoot, identifier)` (`spec.md` §6).

use std::path::{Path, PathBuf};

/// Resolves every on-disk location under `<project>/.command-post/`.
#[derive(Debug, Clone)]
pub struct Paths {
    base: PathBuf,
}

impl Paths {
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            base: project_root.as_ref().join(".command-post"),
        }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn registry(&self) -> PathBuf {
        self.base.join("agent-registry.json")
    }

    pub fn task(&self, task_id: &str) -> PathBuf {
        self.base.join("tasks").join(format!("{task_id}.json"))
    }

    pub fn tasks_dir(&self) -> PathBuf {
        self.base.join("tasks")
    }

    pub fn inbox(&self, agent_id: &str) -> PathBuf {
        self.base.join("messages").join(format!("{agent_id}.json"))
    }

    pub fn events(&self) -> PathBuf {
        self.base.join("events").join("events.jsonl")
    }

    pub fn snapshots_dir(&self) -> PathBuf {
        self.base.join("memory-snapshots")
    }

    /// `memory-snapshots/<agent>-<sortable-ts>.json`. The timestamp must be
    /// a fixed-width UTC RFC3339 string so lexical sort equals chronological
    /// sort (`spec.md` §3, §4.5).
    pub fn snapshot(&self, agent_id: &str, sortable_timestamp: &str) -> PathBuf {
        self.snapshots_dir()
            .join(format!("{agent_id}-{sortable_timestamp}.json"))
    }

    pub fn spawn_request(&self, request_id: &str) -> PathBuf {
        self.base
            .join("spawn-requests")
            .join(format!("{request_id}.json"))
    }

    pub fn spawn_log(&self) -> PathBuf {
        self.base.join("spawn-log.yaml")
    }

    /// The advisory lock file adjacent to `target`.
    pub fn lock_for(target: &Path) -> PathBuf {
        let mut name = target
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        target.with_file_name(name)
    }
}
