// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inbox message types and the sender-role/topology rules `sendMessage`
//! enforces (`spec.md` §4.2). The inbox store itself just appends;
//! validation lives here so it's one source of truth for both the store
//! and anything else (tests, a future CLI) that wants to check a message
//! before handing it to the store.

use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a message, formatted `msg-<uuid>`.
    pub struct MessageId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
    Critical,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    PeerMessage,
    TaskAssignment,
    TaskUpdate,
    AuditReport,
    LifecycleCommand,
    ApprovalRequested,
}

/// The role an agent plays, used by the sender-role validation rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Orchestrator,
    Po,
    Audit,
    ContextMonitor,
    Worker,
}

impl MessageType {
    /// Roles permitted to send this message type, per `spec.md` §4.2.
    /// `PeerMessage` is permitted from any role, represented as `None`.
    pub fn permitted_sender_roles(self) -> Option<&'static [Role]> {
        match self {
            MessageType::TaskAssignment => Some(&[Role::Orchestrator, Role::Po]),
            MessageType::AuditReport => Some(&[Role::Audit]),
            MessageType::LifecycleCommand => Some(&[Role::ContextMonitor, Role::Orchestrator]),
            MessageType::TaskUpdate => Some(&[Role::Worker, Role::Audit]),
            MessageType::PeerMessage => None,
            MessageType::ApprovalRequested => None,
        }
    }

    pub fn is_permitted_from(self, role: Role) -> bool {
        match self.permitted_sender_roles() {
            Some(roles) => roles.contains(&role),
            None => true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub from: String,
    pub to: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    #[serde(default)]
    pub priority: Priority,
    pub body: serde_json::Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<String>,
    #[serde(default)]
    pub read: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[yare::parameterized(
        task_assignment_from_orchestrator = { MessageType::TaskAssignment, Role::Orchestrator, true },
        task_assignment_from_po           = { MessageType::TaskAssignment, Role::Po, true },
        task_assignment_from_worker       = { MessageType::TaskAssignment, Role::Worker, false },
        audit_report_from_audit           = { MessageType::AuditReport, Role::Audit, true },
        audit_report_from_worker          = { MessageType::AuditReport, Role::Worker, false },
        lifecycle_from_context_monitor    = { MessageType::LifecycleCommand, Role::ContextMonitor, true },
        lifecycle_from_orchestrator       = { MessageType::LifecycleCommand, Role::Orchestrator, true },
        lifecycle_from_worker             = { MessageType::LifecycleCommand, Role::Worker, false },
        task_update_from_worker           = { MessageType::TaskUpdate, Role::Worker, true },
        task_update_from_audit            = { MessageType::TaskUpdate, Role::Audit, true },
        task_update_from_po               = { MessageType::TaskUpdate, Role::Po, false },
        peer_message_from_anyone          = { MessageType::PeerMessage, Role::Worker, true },
    )]
    fn sender_role_rules(message_type: MessageType, role: Role, expected: bool) {
        assert_eq!(message_type.is_permitted_from(role), expected);
    }

    #[test]
    fn priority_defaults_to_normal() {
        assert_eq!(Priority::default(), Priority::Normal);
    }
}
