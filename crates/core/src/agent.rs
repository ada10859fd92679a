// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent registry row.
//!
//! One entry per agent that has ever existed on this host, keyed by
//! [`crate::AgentId`] in `agent-registry.json`. A `Replaced` entry is
//! never re-promoted to `Active` (registry uniqueness + the no-resurrection
//! invariant from the data model).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a registered agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Active,
    Dead,
    Replaced,
}

/// A single row in the agent registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRegistryEntry {
    pub session_name: String,
    pub role: String,
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    pub status: AgentStatus,
    pub launched_at: DateTime<Utc>,
    #[serde(default)]
    pub handoff_count: u32,
}

impl AgentRegistryEntry {
    pub fn new(
        session_name: impl Into<String>,
        role: impl Into<String>,
        domain: impl Into<String>,
        launched_at: DateTime<Utc>,
    ) -> Self {
        Self {
            session_name: session_name.into(),
            role: role.into(),
            domain: domain.into(),
            task_id: None,
            transcript_path: None,
            pid: None,
            status: AgentStatus::Active,
            launched_at,
            handoff_count: 0,
        }
    }

    /// Mark this entry replaced. `handoff_count` is monotonically
    /// non-decreasing so callers must pass the new, already-incremented
    /// count rather than bumping it here.
    pub fn mark_replaced(&mut self) {
        self.status = AgentStatus::Replaced;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_entry_starts_active_with_zero_handoffs() {
        let entry = AgentRegistryEntry::new("worker-1", "worker", "backend", Utc::now());
        assert_eq!(entry.status, AgentStatus::Active);
        assert_eq!(entry.handoff_count, 0);
    }

    #[test]
    fn mark_replaced_transitions_status() {
        let mut entry = AgentRegistryEntry::new("worker-1", "worker", "backend", Utc::now());
        entry.mark_replaced();
        assert_eq!(entry.status, AgentStatus::Replaced);
    }

    #[test]
    fn status_serde_roundtrip() {
        for status in [AgentStatus::Active, AgentStatus::Dead, AgentStatus::Replaced] {
            let json = serde_json::to_string(&status).unwrap();
            let parsed: AgentStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(status, parsed);
        }
    }
}
