// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent registry: a single map keyed by agent id, `agent-registry.json`.

use crate::atomic::{atomic_write, ensure_exists};
use crate::lock::with_default_lock;
use crate::paths::Paths;
use cp_core::{AgentId, AgentRegistryEntry, AgentStatus, CommandPostError};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// File-backed store for the agent registry.
pub struct AgentRegistry {
    paths: Paths,
}

type RegistryMap = BTreeMap<String, AgentRegistryEntry>;

impl AgentRegistry {
    pub fn new(paths: Paths) -> Self {
        Self { paths }
    }

    fn path(&self) -> PathBuf {
        self.paths.registry()
    }

    /// Missing registry reads back as an empty map (`spec.md` §8 boundary
    /// behaviors), never an error.
    fn read(&self) -> Result<RegistryMap, CommandPostError> {
        let path = self.path();
        if !path.exists() {
            return Ok(RegistryMap::new());
        }
        let bytes = std::fs::read(&path).map_err(|e| CommandPostError::FileSystem {
            file_path: path.clone(),
            cause: e.to_string(),
        })?;
        if bytes.is_empty() {
            return Ok(RegistryMap::new());
        }
        serde_json::from_slice(&bytes).map_err(|e| CommandPostError::FileSystem {
            file_path: path,
            cause: e.to_string(),
        })
    }

    fn write(&self, map: &RegistryMap) -> Result<(), CommandPostError> {
        let bytes = serde_json::to_vec_pretty(map).map_err(|e| CommandPostError::FileSystem {
            file_path: self.path(),
            cause: e.to_string(),
        })?;
        atomic_write(&self.path(), &bytes)
    }

    /// Register (or overwrite) an agent. Overwrite-idempotent per
    /// `spec.md` §5, but never re-promotes a `Replaced` entry to `Active` —
    /// registering over a replaced id updates everything except status.
    pub async fn register_agent(
        &self,
        agent_id: &AgentId,
        mut entry: AgentRegistryEntry,
    ) -> Result<(), CommandPostError> {
        ensure_exists(&self.path(), b"{}")?;
        with_default_lock(&self.path(), || -> Result<(), CommandPostError> {
            let mut map = self.read()?;
            if let Some(existing) = map.get(agent_id.as_str()) {
                if existing.status == AgentStatus::Replaced {
                    entry.status = AgentStatus::Replaced;
                }
            }
            map.insert(agent_id.as_str().to_string(), entry);
            self.write(&map)
        })
        .await?
    }

    pub async fn get(&self, agent_id: &AgentId) -> Result<Option<AgentRegistryEntry>, CommandPostError> {
        let map = self.read()?;
        Ok(map.get(agent_id.as_str()).cloned())
    }

    pub async fn list(&self) -> Result<Vec<(String, AgentRegistryEntry)>, CommandPostError> {
        let map = self.read()?;
        Ok(map.into_iter().collect())
    }

    /// Mark `agent_id` replaced, leaving every other entry untouched.
    pub async fn mark_replaced(&self, agent_id: &AgentId) -> Result<(), CommandPostError> {
        ensure_exists(&self.path(), b"{}")?;
        with_default_lock(&self.path(), || -> Result<(), CommandPostError> {
            let mut map = self.read()?;
            let entry = map
                .get_mut(agent_id.as_str())
                .ok_or_else(|| CommandPostError::not_found("agent", agent_id.as_str()))?;
            entry.mark_replaced();
            self.write(&map)
        })
        .await?
    }

    /// Bump `handoff_count` on the given entry to `new_count`, rejecting
    /// any attempt to move it backwards (monotonicity invariant).
    pub async fn set_handoff_count(
        &self,
        agent_id: &AgentId,
        new_count: u32,
    ) -> Result<(), CommandPostError> {
        with_default_lock(&self.path(), || -> Result<(), CommandPostError> {
            let mut map = self.read()?;
            let entry = map
                .get_mut(agent_id.as_str())
                .ok_or_else(|| CommandPostError::not_found("agent", agent_id.as_str()))?;
            if new_count < entry.handoff_count {
                return Err(CommandPostError::domain(format!(
                    "handoff_count must be non-decreasing: {} -> {new_count}",
                    entry.handoff_count
                )));
            }
            entry.handoff_count = new_count;
            self.write(&map)
        })
        .await?
    }
}
