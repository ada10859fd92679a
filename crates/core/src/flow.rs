// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory lifecycle flow state (`spec.md` §3, §4.9).
//!
//! Owned by the Replacement Coordinator; never persisted. At most one
//! active flow per outgoing agent id.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowPhase {
    Initiated,
    AwaitingSnapshot,
    Validating,
    ReadyToSpawn,
    Spawning,
    Notifying,
    Completed,
    Aborted,
}

impl FlowPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, FlowPhase::Completed | FlowPhase::Aborted)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleFlowState {
    pub agent_id: String,
    pub phase: FlowPhase,
    pub reason: String,
    pub retry_count: u32,
    pub best_quality_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement_agent_id: Option<String>,
    pub task_ids: Vec<String>,
    pub opened_at: chrono::DateTime<chrono::Utc>,
}

impl LifecycleFlowState {
    pub fn new(
        agent_id: impl Into<String>,
        reason: impl Into<String>,
        task_ids: Vec<String>,
        opened_at: chrono::DateTime<chrono::Utc>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            phase: FlowPhase::AwaitingSnapshot,
            reason: reason.into(),
            retry_count: 0,
            best_quality_score: 0.0,
            replacement_agent_id: None,
            task_ids,
            opened_at,
        }
    }
}
