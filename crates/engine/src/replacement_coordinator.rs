// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Replacement Coordinator: owns the in-memory lifecycle flow and drives
//! the snapshot/quality/spawn sub-protocol end to end (`spec.md` §4.9).

use crate::error::{EngineError, Result};
use crate::handoff_manager::{transfer_tasks, Handoff};
use crate::quality::{self, TaskContext};
use crate::spawn_executor::SpawnExecutor;
use cp_core::{
    AgentId, AgentRegistryEntry, Clock, Event, EventId, FlowPhase, HandoffSignal, IdGen,
    LifecycleEventKind, LifecycleFlowState, MemorySnapshot, MessageType, Priority, Role, SnapshotId,
};
use cp_storage::{AgentRegistry, EventLog, InboxStore, NewMessage, SendOptions, SnapshotStore, SpawnRequestRecord, SpawnRequestStore, TaskStore};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Tunables from `spec.md` §4.9.
#[derive(Debug, Clone)]
pub struct ReplacementConfig {
    pub project_path: String,
    pub orchestrator_id: String,
    pub min_quality_score: f64,
    pub max_snapshot_retries: u32,
}

impl ReplacementConfig {
    pub fn new(project_path: impl Into<String>, orchestrator_id: impl Into<String>) -> Self {
        Self {
            project_path: project_path.into(),
            orchestrator_id: orchestrator_id.into(),
            min_quality_score: 0.7,
            max_snapshot_retries: 3,
        }
    }
}

pub struct ReplacementCoordinator<G: IdGen> {
    registry: AgentRegistry,
    tasks: TaskStore,
    inbox: InboxStore<G>,
    events: EventLog,
    snapshots: SnapshotStore,
    spawn_requests: SpawnRequestStore,
    spawn_executor: Arc<dyn SpawnExecutor>,
    clock: Arc<dyn Clock>,
    id_gen: G,
    config: ReplacementConfig,
    flows: Mutex<HashMap<String, LifecycleFlowState>>,
}

impl<G: IdGen> ReplacementCoordinator<G> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: AgentRegistry,
        tasks: TaskStore,
        inbox: InboxStore<G>,
        events: EventLog,
        snapshots: SnapshotStore,
        spawn_requests: SpawnRequestStore,
        spawn_executor: Arc<dyn SpawnExecutor>,
        clock: Arc<dyn Clock>,
        id_gen: G,
        config: ReplacementConfig,
    ) -> Self {
        Self {
            registry,
            tasks,
            inbox,
            events,
            snapshots,
            spawn_requests,
            spawn_executor,
            clock,
            id_gen,
            config,
            flows: Mutex::new(HashMap::new()),
        }
    }

    /// Read accessor for the ambient status surface; does not mutate.
    pub async fn flow(&self, agent_id: &str) -> Option<LifecycleFlowState> {
        self.flows.lock().await.get(agent_id).cloned()
    }

    async fn append_lifecycle_event(
        &self,
        kind: LifecycleEventKind,
        agent_id: &str,
        data: serde_json::Value,
    ) -> Result<()> {
        let event = Event::lifecycle(
            EventId::new(self.id_gen.next()),
            self.clock.now(),
            kind,
            Some(agent_id.to_string()),
            data,
        );
        self.events.append_event(event).await?;
        Ok(())
    }

    async fn send_lifecycle_command(
        &self,
        agent_id: &str,
        command: &str,
        mut body: serde_json::Value,
    ) -> Result<()> {
        if let serde_json::Value::Object(ref mut map) = body {
            map.insert("command".to_string(), serde_json::Value::String(command.to_string()));
        }
        self.inbox
            .send_message(
                NewMessage {
                    from: "replacement-coordinator".into(),
                    to: agent_id.into(),
                    message_type: MessageType::LifecycleCommand,
                    priority: Some(Priority::High),
                    body,
                    cc: vec![],
                },
                &SendOptions {
                    from_role: Some(Role::ContextMonitor),
                    ..Default::default()
                },
            )
            .await?;
        Ok(())
    }

    /// Creates a flow for `agent_id`. Fails if one is already in flight.
    pub async fn initiate_replacement(
        &self,
        agent_id: &str,
        reason: &str,
        task_ids: Vec<String>,
    ) -> Result<LifecycleFlowState> {
        let mut flows = self.flows.lock().await;
        if flows.contains_key(agent_id) {
            return Err(EngineError::FlowAlreadyExists(agent_id.to_string()));
        }
        let flow = LifecycleFlowState::new(agent_id, reason, task_ids, self.clock.now());
        flows.insert(agent_id.to_string(), flow.clone());
        drop(flows);

        self.send_lifecycle_command(agent_id, "write_memory_snapshot", serde_json::json!({}))
            .await?;
        self.append_lifecycle_event(
            LifecycleEventKind::ReplacementInitiated,
            agent_id,
            serde_json::json!({"reason": reason}),
        )
        .await?;

        Ok(flow)
    }

    /// Idempotent poll: advances the flow if a new snapshot is available,
    /// otherwise returns it unchanged.
    pub async fn process_snapshot(&self, agent_id: &str) -> Result<LifecycleFlowState> {
        let latest = self.snapshots.get_latest_snapshot(agent_id).await?;
        let Some(snapshot) = latest else {
            return self
                .flows
                .lock()
                .await
                .get(agent_id)
                .cloned()
                .ok_or_else(|| EngineError::NoActiveFlow(agent_id.to_string()));
        };

        let report = if snapshot.state.is_some() {
            quality::validate_prd_snapshot(&snapshot, &TaskContext::default())
        } else {
            quality::validate_orchestration_snapshot(&snapshot)
        };

        let mut flows = self.flows.lock().await;
        let flow = flows
            .get_mut(agent_id)
            .ok_or_else(|| EngineError::NoActiveFlow(agent_id.to_string()))?;
        flow.phase = FlowPhase::Validating;
        flow.best_quality_score = flow.best_quality_score.max(report.score);
        flow.retry_count += 1;

        let accepted = report.valid && report.score >= self.config.min_quality_score;
        let retries_remain = flow.retry_count < self.config.max_snapshot_retries;
        let reason = flow.reason.clone();
        drop(flows);

        if accepted {
            return self.run_spawn_subprotocol(agent_id, snapshot, false, &reason).await;
        }

        if retries_remain {
            self.append_lifecycle_event(
                LifecycleEventKind::SnapshotRejected,
                agent_id,
                serde_json::json!({"findings": report.findings}),
            )
            .await?;
            self.send_lifecycle_command(
                agent_id,
                "write_memory_snapshot",
                serde_json::json!({"retry": true}),
            )
            .await?;
            let mut flows = self.flows.lock().await;
            let flow = flows
                .get_mut(agent_id)
                .ok_or_else(|| EngineError::NoActiveFlow(agent_id.to_string()))?;
            flow.phase = FlowPhase::AwaitingSnapshot;
            return Ok(flow.clone());
        }

        self.force_handoff(agent_id, "retry_limit_exhausted").await
    }

    /// Last-resort path: synthesizes a snapshot in memory if none exists on
    /// disk, then proceeds straight to the spawn sub-protocol.
    pub async fn force_handoff(&self, agent_id: &str, reason: &str) -> Result<LifecycleFlowState> {
        {
            let mut flows = self.flows.lock().await;
            let flow = flows
                .get_mut(agent_id)
                .ok_or_else(|| EngineError::NoActiveFlow(agent_id.to_string()))?;
            flow.reason = reason.to_string();
        }

        let snapshot = match self.snapshots.get_latest_snapshot(agent_id).await? {
            Some(snapshot) => snapshot,
            None => self.synthesize_snapshot(agent_id, reason).await?,
        };

        self.run_spawn_subprotocol(agent_id, snapshot, true, reason).await
    }

    async fn synthesize_snapshot(&self, agent_id: &str, reason: &str) -> Result<MemorySnapshot> {
        Ok(MemorySnapshot {
            snapshot_id: SnapshotId::new(self.id_gen.next()),
            agent_id: agent_id.to_string(),
            task_id: None,
            timestamp: self.clock.now(),
            context_usage: Default::default(),
            decision_log: vec![],
            task_status: None,
            handoff_signal: Some(HandoffSignal {
                active: true,
                reason: reason.to_string(),
                ready_to_handoff: true,
            }),
            memory_state: None,
            state: None,
            decisions: vec![],
            gotchas: vec![],
            files_state: None,
            next_steps: vec![],
            dependencies_discovered: vec![],
            handoff_number: 0,
            forced: true,
        })
    }

    /// Shared by the normal and forced paths once a snapshot (real or
    /// synthetic) is in hand.
    async fn run_spawn_subprotocol(
        &self,
        agent_id: &str,
        snapshot: MemorySnapshot,
        forced: bool,
        reason: &str,
    ) -> Result<LifecycleFlowState> {
        let (task_ids, best_quality_score) = {
            let mut flows = self.flows.lock().await;
            let flow = flows
                .get_mut(agent_id)
                .ok_or_else(|| EngineError::NoActiveFlow(agent_id.to_string()))?;
            flow.phase = FlowPhase::ReadyToSpawn;
            (flow.task_ids.clone(), flow.best_quality_score)
        };

        let entry = self.registry.get(&AgentId::new(agent_id)).await?;
        let (role, domain, handoff_count) = entry
            .as_ref()
            .map(|e| (e.role.clone(), e.domain.clone(), e.handoff_count))
            .unwrap_or_else(|| ("worker".to_string(), String::new(), 0));

        let replacement_agent_id = format!("{agent_id}-r{}", handoff_count + 1);
        let request_id = format!("req-{}", self.id_gen.next());
        let instructions_path = format!(
            "{}/agents/{replacement_agent_id}/INSTRUCTIONS.md",
            self.config.project_path
        );

        let record = SpawnRequestRecord {
            request_id: request_id.clone(),
            replacement_agent_id: replacement_agent_id.clone(),
            original_agent_id: agent_id.to_string(),
            instructions_path,
            prepared_instructions: format!(
                "You are replacing {agent_id}. Reason: {reason}. Read the attached memory snapshot before continuing its work."
            ),
            snapshot,
            task_ids: task_ids.clone(),
            role,
            domain,
            handoff_number: handoff_count + 1,
            project_path: self.config.project_path.clone(),
            timestamp: self.clock.now(),
        };

        {
            let mut flows = self.flows.lock().await;
            if let Some(flow) = flows.get_mut(agent_id) {
                flow.phase = FlowPhase::Spawning;
            }
        }

        self.spawn_requests.record_spawn_request(record.clone()).await?;
        let outcome = self.spawn_executor.spawn(&record).await;

        if !outcome.success {
            self.append_lifecycle_event(
                LifecycleEventKind::ReplacementFailed,
                agent_id,
                serde_json::json!({"error": outcome.error, "request_id": request_id}),
            )
            .await?;
            self.send_orchestrator_report(
                agent_id,
                &replacement_agent_id,
                forced,
                reason,
                best_quality_score,
                false,
                outcome.error.as_deref(),
            )
            .await?;

            let mut flows = self.flows.lock().await;
            let flow = flows
                .get_mut(agent_id)
                .ok_or_else(|| EngineError::NoActiveFlow(agent_id.to_string()))?;
            flow.phase = FlowPhase::Aborted;
            return Ok(flow.clone());
        }

        {
            let mut flows = self.flows.lock().await;
            if let Some(flow) = flows.get_mut(agent_id) {
                flow.phase = FlowPhase::Notifying;
            }
        }

        let mut handoff = Handoff::new(agent_id, replacement_agent_id.as_str(), record.snapshot.snapshot_id.as_str());
        transfer_tasks(&self.tasks, &mut handoff).await?;

        self.registry.mark_replaced(&AgentId::new(agent_id)).await?;
        self.registry
            .register_agent(
                &AgentId::new(replacement_agent_id.as_str()),
                AgentRegistryEntry {
                    handoff_count: handoff_count + 1,
                    ..AgentRegistryEntry::new(
                        replacement_agent_id.as_str(),
                        record.role.as_str(),
                        record.domain.as_str(),
                        self.clock.now(),
                    )
                },
            )
            .await?;

        self.send_orchestrator_report(
            agent_id,
            &replacement_agent_id,
            forced,
            reason,
            best_quality_score,
            true,
            None,
        )
        .await?;

        self.send_lifecycle_command(
            agent_id,
            "prepare_shutdown",
            serde_json::json!({"replacementAgentId": replacement_agent_id}),
        )
        .await?;

        self.append_lifecycle_event(
            LifecycleEventKind::ReplacementCompleted,
            agent_id,
            serde_json::json!({"replacement_agent_id": replacement_agent_id, "forced": forced}),
        )
        .await?;

        let mut flows = self.flows.lock().await;
        let flow = flows
            .get_mut(agent_id)
            .ok_or_else(|| EngineError::NoActiveFlow(agent_id.to_string()))?;
        flow.phase = FlowPhase::Completed;
        flow.replacement_agent_id = Some(replacement_agent_id);
        Ok(flow.clone())
    }

    #[allow(clippy::too_many_arguments)]
    async fn send_orchestrator_report(
        &self,
        original_agent_id: &str,
        replacement_agent_id: &str,
        forced: bool,
        reason: &str,
        quality_score: f64,
        completed: bool,
        error: Option<&str>,
    ) -> Result<()> {
        let report_type = if completed {
            "agent_replacement_completed"
        } else {
            "agent_replacement_failed"
        };
        let mut body = serde_json::json!({
            "report_type": report_type,
            "originalAgentId": original_agent_id,
            "replacementAgentId": replacement_agent_id,
            "forced": forced,
            "reason": reason,
            "qualityScore": quality_score,
        });
        if let Some(error) = error {
            body["error"] = serde_json::Value::String(error.to_string());
        }
        self.inbox
            .send_message(
                NewMessage {
                    from: "replacement-coordinator".into(),
                    to: self.config.orchestrator_id.clone(),
                    message_type: MessageType::TaskUpdate,
                    priority: Some(Priority::High),
                    body,
                    cc: vec![],
                },
                &SendOptions {
                    from_role: Some(Role::Audit),
                    ..Default::default()
                },
            )
            .await?;
        Ok(())
    }

    /// General escape hatch: aborts a non-terminal flow outside the normal
    /// spawn sub-protocol failure path.
    pub async fn abort(&self, agent_id: &str, reason: &str) -> Result<LifecycleFlowState> {
        let mut flows = self.flows.lock().await;
        let flow = flows
            .get_mut(agent_id)
            .ok_or_else(|| EngineError::NoActiveFlow(agent_id.to_string()))?;
        flow.phase = FlowPhase::Aborted;
        flow.reason = reason.to_string();
        let result = flow.clone();
        drop(flows);
        self.append_lifecycle_event(
            LifecycleEventKind::HandoffFailed,
            agent_id,
            serde_json::json!({"reason": reason}),
        )
        .await?;
        Ok(result)
    }
}
