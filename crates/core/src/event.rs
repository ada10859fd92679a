// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only event log entries, and the closed lifecycle-event enum.
//!
//! The source this spec was distilled from dispatches on tagged strings
//! for event kinds; per the redesign note in `spec.md` §9 we use a closed
//! enum in memory with a mapping to the coarser, stable strings that
//! actually land in `events.jsonl`. Several lifecycle kinds share the
//! `error_occurred` stored bucket; the original, finer-grained kind is
//! preserved in `data.lifecycle_event` so nothing is lost on disk.

use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for an event log entry.
    pub struct EventId;
}

/// Exhaustive set of lifecycle events the replacement engine can emit.
/// `core_event_type` is the value actually written to `event_type` on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEventKind {
    ContextUsageWarning,
    ContextUsageCritical,
    ReplacementInitiated,
    SnapshotRejected,
    ReplacementCompleted,
    ReplacementFailed,
    HandoffFailed,
}

impl LifecycleEventKind {
    /// The coarser, stable `event_type` string stored on disk.
    pub fn core_event_type(self) -> &'static str {
        match self {
            LifecycleEventKind::ContextUsageWarning => "context_usage_warning",
            LifecycleEventKind::ContextUsageCritical => "context_usage_critical",
            LifecycleEventKind::ReplacementInitiated => "replacement_initiated",
            LifecycleEventKind::SnapshotRejected => "context_snapshot_rejected",
            LifecycleEventKind::ReplacementCompleted => "agent_replacement_completed",
            // The source multiplexes several failure kinds into one stored
            // bucket; the specific kind survives in `data.lifecycle_event`.
            LifecycleEventKind::ReplacementFailed => "error_occurred",
            LifecycleEventKind::HandoffFailed => "error_occurred",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_id: EventId,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Event {
    /// Build an event from a closed lifecycle-event kind, stamping the
    /// finer-grained kind into `data.lifecycle_event` when the kind maps
    /// to a shared stored bucket.
    pub fn lifecycle(
        id: EventId,
        timestamp: chrono::DateTime<chrono::Utc>,
        kind: LifecycleEventKind,
        agent_id: Option<String>,
        mut data: serde_json::Value,
    ) -> Self {
        if let serde_json::Value::Object(ref mut map) = data {
            map.insert(
                "lifecycle_event".to_string(),
                serde_json::Value::String(format!("{kind:?}")),
            );
        }
        Self {
            event_id: id,
            timestamp,
            event_type: kind.core_event_type().to_string(),
            agent_id,
            data,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub agent_id: Option<String>,
    pub event_type: Option<String>,
    pub start_time: Option<chrono::DateTime<chrono::Utc>>,
}

impl EventFilter {
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(ref agent_id) = self.agent_id {
            if event.agent_id.as_deref() != Some(agent_id.as_str()) {
                return false;
            }
        }
        if let Some(ref event_type) = self.event_type {
            if &event.event_type != event_type {
                return false;
            }
        }
        if let Some(start_time) = self.start_time {
            if event.timestamp < start_time {
                return false;
            }
        }
        true
    }
}
