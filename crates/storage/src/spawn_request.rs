// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Spawn request audit trail: `spawn-requests/<id>.json` plus the running
//! `spawn-log.yaml` (`spec.md` §4.9, §6).

use crate::atomic::atomic_write;
use crate::lock::with_default_lock;
use crate::paths::Paths;
use cp_core::{CommandPostError, MemorySnapshot};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The request handed to the `SpawnExecutor`, and also the shape written
/// to `spawn-requests/<id>.json` for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnRequestRecord {
    pub request_id: String,
    pub replacement_agent_id: String,
    pub original_agent_id: String,
    pub instructions_path: String,
    pub prepared_instructions: String,
    pub snapshot: MemorySnapshot,
    pub task_ids: Vec<String>,
    pub role: String,
    pub domain: String,
    pub handoff_number: u32,
    pub project_path: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SpawnLog {
    #[serde(default)]
    spawned_agents: Vec<SpawnLogEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SpawnLogEntry {
    request_id: String,
    replacement_agent_id: String,
    original_agent_id: String,
    handoff_number: u32,
    timestamp: chrono::DateTime<chrono::Utc>,
}

impl From<&SpawnRequestRecord> for SpawnLogEntry {
    fn from(record: &SpawnRequestRecord) -> Self {
        Self {
            request_id: record.request_id.clone(),
            replacement_agent_id: record.replacement_agent_id.clone(),
            original_agent_id: record.original_agent_id.clone(),
            handoff_number: record.handoff_number,
            timestamp: record.timestamp,
        }
    }
}

pub struct SpawnRequestStore {
    paths: Paths,
}

impl SpawnRequestStore {
    pub fn new(paths: Paths) -> Self {
        Self { paths }
    }

    fn request_path(&self, request_id: &str) -> PathBuf {
        self.paths.spawn_request(request_id)
    }

    fn log_path(&self) -> PathBuf {
        self.paths.spawn_log()
    }

    fn read_log(&self) -> Result<SpawnLog, CommandPostError> {
        let path = self.log_path();
        if !path.exists() {
            return Ok(SpawnLog::default());
        }
        let bytes = std::fs::read(&path).map_err(|e| CommandPostError::FileSystem {
            file_path: path.clone(),
            cause: e.to_string(),
        })?;
        if bytes.is_empty() {
            return Ok(SpawnLog::default());
        }
        serde_yaml::from_slice(&bytes).map_err(|e| CommandPostError::FileSystem {
            file_path: path,
            cause: e.to_string(),
        })
    }

    fn write_log(&self, log: &SpawnLog) -> Result<(), CommandPostError> {
        let bytes = serde_yaml::to_string(log).map_err(|e| CommandPostError::FileSystem {
            file_path: self.log_path(),
            cause: e.to_string(),
        })?;
        atomic_write(&self.log_path(), bytes.as_bytes())
    }

    /// Writes the audit file for `record` and appends its summary to
    /// `spawn-log.yaml`. Both sub-steps are idempotent on `request_id`.
    pub async fn record_spawn_request(
        &self,
        record: SpawnRequestRecord,
    ) -> Result<(), CommandPostError> {
        let bytes = serde_json::to_vec_pretty(&record).map_err(|e| CommandPostError::FileSystem {
            file_path: self.request_path(&record.request_id),
            cause: e.to_string(),
        })?;
        atomic_write(&self.request_path(&record.request_id), &bytes)?;

        let log_path = self.log_path();
        if !log_path.exists() {
            atomic_write(&log_path, b"spawned_agents: []\n")?;
        }
        with_default_lock(&log_path, || -> Result<(), CommandPostError> {
            let mut log = self.read_log()?;
            if !log
                .spawned_agents
                .iter()
                .any(|e| e.request_id == record.request_id)
            {
                log.spawned_agents.push(SpawnLogEntry::from(&record));
            }
            self.write_log(&log)
        })
        .await?
    }

    pub async fn get_spawn_request(
        &self,
        request_id: &str,
    ) -> Result<Option<SpawnRequestRecord>, CommandPostError> {
        let path = self.request_path(request_id);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(&path).map_err(|e| CommandPostError::FileSystem {
            file_path: path.clone(),
            cause: e.to_string(),
        })?;
        let record = serde_json::from_slice(&bytes).map_err(|e| CommandPostError::FileSystem {
            file_path: path,
            cause: e.to_string(),
        })?;
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cp_core::{ContextUsage, SnapshotId};
    use tempfile::tempdir;

    fn sample(request_id: &str) -> SpawnRequestRecord {
        SpawnRequestRecord {
            request_id: request_id.to_string(),
            replacement_agent_id: "worker-1-r1".to_string(),
            original_agent_id: "worker-1".to_string(),
            instructions_path: "/project/agents/worker-1-r1/INSTRUCTIONS.md".to_string(),
            prepared_instructions: "do the thing".to_string(),
            snapshot: MemorySnapshot {
                snapshot_id: SnapshotId::new("snap-1"),
                agent_id: "worker-1".to_string(),
                task_id: None,
                timestamp: chrono::Utc::now(),
                context_usage: ContextUsage::default(),
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
                handoff_number: 1,
                forced: false,
            },
            task_ids: vec!["task-1".to_string()],
            role: "worker".to_string(),
            domain: "backend".to_string(),
            handoff_number: 1,
            project_path: "/project".to_string(),
            timestamp: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn record_then_get_roundtrip() {
        let dir = tempdir().unwrap();
        let store = SpawnRequestStore::new(Paths::new(dir.path()));
        store.record_spawn_request(sample("req-1")).await.unwrap();
        let fetched = store.get_spawn_request("req-1").await.unwrap().unwrap();
        assert_eq!(fetched.replacement_agent_id, "worker-1-r1");
    }

    #[tokio::test]
    async fn record_appends_to_spawn_log_yaml() {
        let dir = tempdir().unwrap();
        let store = SpawnRequestStore::new(Paths::new(dir.path()));
        store.record_spawn_request(sample("req-1")).await.unwrap();
        store.record_spawn_request(sample("req-2")).await.unwrap();

        let log = store.read_log().unwrap();
        assert_eq!(log.spawned_agents.len(), 2);
    }

    #[tokio::test]
    async fn recording_same_request_id_twice_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = SpawnRequestStore::new(Paths::new(dir.path()));
        store.record_spawn_request(sample("req-1")).await.unwrap();
        store.record_spawn_request(sample("req-1")).await.unwrap();
        let log = store.read_log().unwrap();
        assert_eq!(log.spawned_agents.len(), 1);
    }

    #[tokio::test]
    async fn get_missing_request_returns_none() {
        let dir = tempdir().unwrap();
        let store = SpawnRequestStore::new(Paths::new(dir.path()));
        assert!(store.get_spawn_request("ghost").await.unwrap().is_none());
    }
}
