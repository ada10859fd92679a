// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Memory snapshot store: immutable files under `memory-snapshots/` (`spec.md` §4.5).
//!
//! Filenames are `<agent>-<rfc3339-timestamp>-<short-id>.json`. The
//! timestamp is first so lexical filename sort equals chronological sort;
//! the short id suffix only exists to disambiguate two snapshots for the
//! same agent landing in the same millisecond.

use crate::atomic::atomic_write;
use crate::paths::Paths;
use cp_core::{CommandPostError, MemorySnapshot};
use std::path::PathBuf;

pub struct SnapshotStore {
    paths: Paths,
}

fn sortable_timestamp(snapshot: &MemorySnapshot) -> String {
    let ts = snapshot
        .timestamp
        .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
        .replace(':', "-");
    format!("{ts}-{}", snapshot.snapshot_id.short(8))
}

impl SnapshotStore {
    pub fn new(paths: Paths) -> Self {
        Self { paths }
    }

    fn path_for(&self, snapshot: &MemorySnapshot) -> PathBuf {
        self.paths.snapshot(&snapshot.agent_id, &sortable_timestamp(snapshot))
    }

    fn prefix_for(&self, agent_id: &str) -> String {
        format!("{agent_id}-")
    }

    /// Writes `snapshot` as a new immutable file. Snapshots are never
    /// overwritten once written; this always creates a new file.
    pub async fn create_snapshot(
        &self,
        snapshot: MemorySnapshot,
    ) -> Result<MemorySnapshot, CommandPostError> {
        let path = self.path_for(&snapshot);
        let bytes = serde_json::to_vec_pretty(&snapshot).map_err(|e| CommandPostError::FileSystem {
            file_path: path.clone(),
            cause: e.to_string(),
        })?;
        atomic_write(&path, &bytes)?;
        Ok(snapshot)
    }

    /// All snapshot file paths for `agent_id`, sorted ascending (oldest
    /// first — filename order is chronological order).
    fn list_paths(&self, agent_id: &str) -> Result<Vec<PathBuf>, CommandPostError> {
        let dir = self.paths.snapshots_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let prefix = self.prefix_for(agent_id);
        let entries = std::fs::read_dir(&dir).map_err(|e| CommandPostError::FileSystem {
            file_path: dir.clone(),
            cause: e.to_string(),
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| CommandPostError::FileSystem {
                file_path: dir.clone(),
                cause: e.to_string(),
            })?;
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.ends_with(".json") {
                if let Some(rest) = name.strip_prefix(&prefix) {
                    // A replacement agent is named `<agent>-r<n>`, so
                    // `"worker-1-"` is also a prefix of `worker-1-r1-...`.
                    // The real suffix always starts with the rfc3339
                    // timestamp's leading digit; reject anything else so a
                    // replacement's snapshots never bleed into its source's.
                    if rest.starts_with(|c: char| c.is_ascii_digit()) {
                        paths.push(path);
                    }
                }
            }
        }
        paths.sort();
        Ok(paths)
    }

    fn read(&self, path: &PathBuf) -> Result<MemorySnapshot, CommandPostError> {
        let bytes = std::fs::read(path).map_err(|e| CommandPostError::FileSystem {
            file_path: path.clone(),
            cause: e.to_string(),
        })?;
        serde_json::from_slice(&bytes).map_err(|e| CommandPostError::FileSystem {
            file_path: path.clone(),
            cause: e.to_string(),
        })
    }

    pub async fn get_latest_snapshot(
        &self,
        agent_id: &str,
    ) -> Result<Option<MemorySnapshot>, CommandPostError> {
        let paths = self.list_paths(agent_id)?;
        match paths.last() {
            Some(path) => Ok(Some(self.read(path)?)),
            None => Ok(None),
        }
    }

    /// Every snapshot for `agent_id`, oldest first.
    pub async fn query_snapshots(
        &self,
        agent_id: &str,
    ) -> Result<Vec<MemorySnapshot>, CommandPostError> {
        self.list_paths(agent_id)?
            .iter()
            .map(|path| self.read(path))
            .collect()
    }

    /// Deletes every snapshot for `agent_id` except the `keep` newest,
    /// returning the number of files removed.
    pub async fn cleanup_old_snapshots(
        &self,
        agent_id: &str,
        keep: usize,
    ) -> Result<usize, CommandPostError> {
        let paths = self.list_paths(agent_id)?;
        if paths.len() <= keep {
            return Ok(0);
        }
        let to_delete = &paths[..paths.len() - keep];
        let mut removed = 0;
        for path in to_delete {
            std::fs::remove_file(path).map_err(|e| CommandPostError::FileSystem {
                file_path: path.clone(),
                cause: e.to_string(),
            })?;
            removed += 1;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cp_core::{ContextUsage, SnapshotId};
    use tempfile::tempdir;

    fn store() -> (tempfile::TempDir, SnapshotStore) {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::new(Paths::new(dir.path()));
        (dir, store)
    }

    fn snapshot(id: &str, agent_id: &str, ts: chrono::DateTime<chrono::Utc>) -> MemorySnapshot {
        MemorySnapshot {
            snapshot_id: SnapshotId::new(id),
            agent_id: agent_id.to_string(),
            task_id: None,
            timestamp: ts,
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
            handoff_number: 0,
            forced: false,
        }
    }

    #[tokio::test]
    async fn create_then_get_latest_roundtrip() {
        let (_dir, store) = store();
        let t0 = chrono::Utc::now();
        store.create_snapshot(snapshot("snap-1", "worker-1", t0)).await.unwrap();
        let t1 = t0 + chrono::Duration::milliseconds(500);
        store.create_snapshot(snapshot("snap-2", "worker-1", t1)).await.unwrap();

        let latest = store.get_latest_snapshot("worker-1").await.unwrap().unwrap();
        assert_eq!(latest.snapshot_id, SnapshotId::new("snap-2"));
    }

    #[tokio::test]
    async fn get_latest_for_unknown_agent_is_none() {
        let (_dir, store) = store();
        assert!(store.get_latest_snapshot("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn query_snapshots_is_oldest_first_and_scoped_to_agent() {
        let (_dir, store) = store();
        let t0 = chrono::Utc::now();
        store.create_snapshot(snapshot("snap-1", "worker-1", t0)).await.unwrap();
        store
            .create_snapshot(snapshot("snap-x", "worker-2", t0))
            .await
            .unwrap();
        let t1 = t0 + chrono::Duration::milliseconds(500);
        store.create_snapshot(snapshot("snap-2", "worker-1", t1)).await.unwrap();

        let snaps = store.query_snapshots("worker-1").await.unwrap();
        assert_eq!(snaps.len(), 2);
        assert_eq!(snaps[0].snapshot_id, SnapshotId::new("snap-1"));
        assert_eq!(snaps[1].snapshot_id, SnapshotId::new("snap-2"));
    }

    #[tokio::test]
    async fn cleanup_keeps_only_the_newest_n() {
        let (_dir, store) = store();
        let t0 = chrono::Utc::now();
        for i in 0..5 {
            let ts = t0 + chrono::Duration::milliseconds(i * 100);
            store
                .create_snapshot(snapshot(&format!("snap-{i}"), "worker-1", ts))
                .await
                .unwrap();
        }
        let removed = store.cleanup_old_snapshots("worker-1", 2).await.unwrap();
        assert_eq!(removed, 3);
        let remaining = store.query_snapshots("worker-1").await.unwrap();
        assert_eq!(remaining.len(), 2);
        assert_eq!(remaining[0].snapshot_id, SnapshotId::new("snap-3"));
        assert_eq!(remaining[1].snapshot_id, SnapshotId::new("snap-4"));
    }

    #[tokio::test]
    async fn query_snapshots_excludes_replacement_whose_id_is_a_name_prefix_match() {
        let (_dir, store) = store();
        let t0 = chrono::Utc::now();
        store
            .create_snapshot(snapshot("snap-1", "worker-1", t0))
            .await
            .unwrap();
        let t1 = t0 + chrono::Duration::milliseconds(500);
        store
            .create_snapshot(snapshot("snap-r1", "worker-1-r1", t1))
            .await
            .unwrap();

        let snaps = store.query_snapshots("worker-1").await.unwrap();
        assert_eq!(snaps.len(), 1);
        assert_eq!(snaps[0].snapshot_id, SnapshotId::new("snap-1"));

        let latest = store.get_latest_snapshot("worker-1").await.unwrap().unwrap();
        assert_eq!(latest.snapshot_id, SnapshotId::new("snap-1"));

        let replacement_snaps = store.query_snapshots("worker-1-r1").await.unwrap();
        assert_eq!(replacement_snaps.len(), 1);
        assert_eq!(replacement_snaps[0].snapshot_id, SnapshotId::new("snap-r1"));
    }

    #[tokio::test]
    async fn cleanup_is_noop_when_under_the_limit() {
        let (_dir, store) = store();
        store
            .create_snapshot(snapshot("snap-1", "worker-1", chrono::Utc::now()))
            .await
            .unwrap();
        let removed = store.cleanup_old_snapshots("worker-1", 5).await.unwrap();
        assert_eq!(removed, 0);
    }
}
