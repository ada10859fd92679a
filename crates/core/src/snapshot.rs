// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Memory snapshot types (`spec.md` §3).
//!
//! A snapshot is immutable once written. The PRD-specific fields
//! (`state`, `decisions`, `gotchas`, `files_state`, `next_steps`,
//! `dependencies_discovered`, `handoff_number`) are optional so the same
//! file shape covers both a plain orchestration snapshot and a richer
//! PRD snapshot — the quality validator has a check matrix for each.

use crate::SnapshotId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub percentage_of_max: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionLogEntry {
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

/// A decision entry in a PRD snapshot's `decisions[]` array. Distinct from
/// [`DecisionLogEntry`] because the quality validator's
/// `decisions_have_rationale` check requires `rationale` to be non-empty
/// here, whereas the orchestration `decisionLog[]` only warns on emptiness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrdDecision {
    pub summary: String,
    #[serde(default)]
    pub rationale: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilesState {
    #[serde(default)]
    pub completed: Vec<String>,
    #[serde(default)]
    pub in_progress: Vec<String>,
    #[serde(default)]
    pub not_started: Vec<String>,
}

impl FilesState {
    pub fn is_empty(&self) -> bool {
        self.completed.is_empty() && self.in_progress.is_empty() && self.not_started.is_empty()
    }

    pub fn contains(&self, file: &str) -> bool {
        self.completed.iter().any(|f| f == file)
            || self.in_progress.iter().any(|f| f == file)
            || self.not_started.iter().any(|f| f == file)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrdState {
    #[serde(default)]
    pub current_step: String,
    #[serde(default)]
    pub progress_summary: String,
    #[serde(default)]
    pub completion_estimate: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoffSignal {
    pub active: bool,
    pub reason: String,
    pub ready_to_handoff: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemorySnapshot {
    pub snapshot_id: SnapshotId,
    pub agent_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub context_usage: ContextUsage,
    #[serde(default)]
    pub decision_log: Vec<DecisionLogEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handoff_signal: Option<HandoffSignal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_state: Option<serde_json::Value>,

    // PRD-snapshot extension fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<PrdState>,
    #[serde(default)]
    pub decisions: Vec<PrdDecision>,
    #[serde(default)]
    pub gotchas: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files_state: Option<FilesState>,
    #[serde(default)]
    pub next_steps: Vec<String>,
    #[serde(default)]
    pub dependencies_discovered: Vec<String>,
    #[serde(default)]
    pub handoff_number: u32,

    /// Set when this snapshot was synthesized in-memory by `forceHandoff`
    /// rather than produced by the outgoing agent.
    #[serde(default)]
    pub forced: bool,
}
