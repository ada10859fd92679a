// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inbox store: a per-agent append-ordered message log, plus the
//! `sendMessage` policy layer (`spec.md` §4.2).

use crate::atomic::{atomic_write, ensure_exists};
use crate::lock::with_default_lock;
use crate::paths::Paths;
use cp_core::{CommandPostError, IdGen, Message, MessageId, MessageType, Priority, Role};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct InboxFile {
    #[serde(default)]
    messages: Vec<Message>,
}

#[derive(Debug, Clone, Default)]
pub struct MessageFilter {
    pub message_type: Option<MessageType>,
    pub unread_only: bool,
}

impl MessageFilter {
    fn matches(&self, m: &Message) -> bool {
        if let Some(message_type) = self.message_type {
            if std::mem::discriminant(&m.message_type) != std::mem::discriminant(&message_type) {
                return false;
            }
        }
        if self.unread_only && m.read {
            return false;
        }
        true
    }
}

/// Options accepted by `sendMessage`'s policy layer.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    pub from_role: Option<Role>,
    pub to_role: Option<Role>,
    pub skip_validation: bool,
    pub lateral_messaging_enabled: bool,
    pub known_agent_ids: Option<HashSet<String>>,
    pub cc_orchestrator: Option<String>,
}

/// A new message to be delivered; `id`/`timestamp`/`priority` are filled
/// in by `sendMessage` itself.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub from: String,
    pub to: String,
    pub message_type: MessageType,
    pub priority: Option<Priority>,
    pub body: serde_json::Value,
    pub cc: Vec<String>,
}

pub struct InboxStore<G: IdGen> {
    paths: Paths,
    clock: std::sync::Arc<dyn cp_core::Clock>,
    id_gen: G,
}

impl<G: IdGen> InboxStore<G> {
    pub fn new(paths: Paths, clock: std::sync::Arc<dyn cp_core::Clock>, id_gen: G) -> Self {
        Self { paths, clock, id_gen }
    }

    fn path(&self, agent_id: &str) -> PathBuf {
        self.paths.inbox(agent_id)
    }

    /// Missing inbox reads back as an empty list, never an error.
    fn read(&self, agent_id: &str) -> Result<InboxFile, CommandPostError> {
        let path = self.path(agent_id);
        if !path.exists() {
            return Ok(InboxFile::default());
        }
        let bytes = std::fs::read(&path).map_err(|e| CommandPostError::FileSystem {
            file_path: path.clone(),
            cause: e.to_string(),
        })?;
        if bytes.is_empty() {
            return Ok(InboxFile::default());
        }
        serde_json::from_slice(&bytes).map_err(|e| CommandPostError::FileSystem {
            file_path: path,
            cause: e.to_string(),
        })
    }

    fn write(&self, agent_id: &str, file: &InboxFile) -> Result<(), CommandPostError> {
        let bytes = serde_json::to_vec_pretty(file).map_err(|e| CommandPostError::FileSystem {
            file_path: self.path(agent_id),
            cause: e.to_string(),
        })?;
        atomic_write(&self.path(agent_id), &bytes)
    }

    pub async fn read_inbox(&self, agent_id: &str) -> Result<Vec<Message>, CommandPostError> {
        Ok(self.read(agent_id)?.messages)
    }

    pub async fn get_message(
        &self,
        agent_id: &str,
        message_id: &str,
    ) -> Result<Option<Message>, CommandPostError> {
        Ok(self
            .read(agent_id)?
            .messages
            .into_iter()
            .find(|m| m.id.as_str() == message_id))
    }

    pub async fn query_messages(
        &self,
        agent_id: &str,
        filter: &MessageFilter,
    ) -> Result<Vec<Message>, CommandPostError> {
        Ok(self
            .read(agent_id)?
            .messages
            .into_iter()
            .filter(|m| filter.matches(m))
            .collect())
    }

    /// De-duplicates by message id: writing a message whose id is already
    /// present in the inbox is a no-op.
    pub async fn write_to_inbox(
        &self,
        agent_id: &str,
        message: Message,
    ) -> Result<(), CommandPostError> {
        let path = self.path(agent_id);
        ensure_exists(&path, br#"{"messages":[]}"#)?;
        with_default_lock(&path, || -> Result<(), CommandPostError> {
            let mut file = self.read(agent_id)?;
            if !file.messages.iter().any(|m| m.id == message.id) {
                file.messages.push(message);
            }
            self.write(agent_id, &file)
        })
        .await?
    }

    pub async fn mark_message_read(
        &self,
        agent_id: &str,
        message_id: &str,
    ) -> Result<(), CommandPostError> {
        let path = self.path(agent_id);
        with_default_lock(&path, || -> Result<(), CommandPostError> {
            let mut file = self.read(agent_id)?;
            let message = file
                .messages
                .iter_mut()
                .find(|m| m.id.as_str() == message_id)
                .ok_or_else(|| CommandPostError::not_found("message", message_id))?;
            message.read = true;
            self.write(agent_id, &file)
        })
        .await?
    }

    pub async fn delete_message(
        &self,
        agent_id: &str,
        message_id: &str,
    ) -> Result<(), CommandPostError> {
        let path = self.path(agent_id);
        with_default_lock(&path, || -> Result<(), CommandPostError> {
            let mut file = self.read(agent_id)?;
            let before = file.messages.len();
            file.messages.retain(|m| m.id.as_str() != message_id);
            if file.messages.len() == before {
                return Err(CommandPostError::not_found("message", message_id));
            }
            self.write(agent_id, &file)
        })
        .await?
    }

    /// The policy layer: validates roles/topology/laterality, stamps
    /// `id`/`timestamp`, defaults `priority`, adds the orchestrator to `cc`
    /// when configured, and delivers once per distinct recipient.
    pub async fn send_message(
        &self,
        new: NewMessage,
        opts: &SendOptions,
    ) -> Result<Message, CommandPostError> {
        self.validate(&new, opts)?;

        let mut cc = new.cc.clone();
        if let Some(ref orch) = opts.cc_orchestrator {
            let both_workers = opts.from_role == Some(Role::Worker) && opts.to_role == Some(Role::Worker);
            if both_workers && orch != &new.to && !cc.iter().any(|c| c == orch) {
                cc.push(orch.clone());
            }
        }

        let message = Message {
            id: MessageId::new(self.id_gen.next()),
            from: new.from.clone(),
            to: new.to.clone(),
            timestamp: self.clock.now(),
            message_type: new.message_type,
            priority: new.priority.unwrap_or_default(),
            body: new.body,
            cc: cc.clone(),
            read: false,
        };

        let mut recipients: Vec<&str> = Vec::with_capacity(1 + cc.len());
        recipients.push(new.to.as_str());
        for c in &cc {
            if !recipients.contains(&c.as_str()) {
                recipients.push(c.as_str());
            }
        }

        for recipient in recipients {
            self.write_to_inbox(recipient, message.clone()).await?;
        }

        Ok(message)
    }

    fn validate(&self, new: &NewMessage, opts: &SendOptions) -> Result<(), CommandPostError> {
        if let Some(ref known) = opts.known_agent_ids {
            let mut bad = Vec::new();
            if !known.contains(&new.to) {
                bad.push(format!("unknown recipient: {}", new.to));
            }
            for c in &new.cc {
                if !known.contains(c) {
                    bad.push(format!("unknown cc recipient: {c}"));
                }
            }
            if !bad.is_empty() {
                return Err(CommandPostError::validation("message.to/cc", bad));
            }
        }

        if opts.skip_validation {
            return Ok(());
        }

        let both_workers = opts.from_role == Some(Role::Worker) && opts.to_role == Some(Role::Worker);
        if both_workers {
            if !opts.lateral_messaging_enabled {
                return Err(CommandPostError::validation(
                    "message.type",
                    vec!["lateral messaging is disabled between workers".to_string()],
                ));
            }
            if !matches!(new.message_type, MessageType::PeerMessage) {
                return Err(CommandPostError::validation(
                    "message.type",
                    vec![format!(
                        "only peer_message is allowed between workers, got {:?}",
                        new.message_type
                    )],
                ));
            }
        }

        if let Some(role) = opts.from_role {
            if !new.message_type.is_permitted_from(role) {
                return Err(CommandPostError::validation(
                    "message.type",
                    vec![format!("{:?} is not permitted from role {:?}", new.message_type, role)],
                ));
            }
        }

        Ok(())
    }
}
