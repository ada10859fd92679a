// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reconciliation loop: polls in-flight lifecycle flows so a watched
//! agent's replacement eventually completes even if the agent never
//! checks back in.
//!
//! Flows themselves live only in the coordinator's in-memory map, so a
//! daemon restart loses track of anything in flight; an external caller
//! is expected to re-[`watch`](Reconciler::watch) an agent after restart
//! if it still cares about that flow's outcome.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use cp_core::IdGen;
use cp_engine::ReplacementCoordinator;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Polls a set of watched agent ids, advancing each one's replacement
/// flow and forcing a handoff once it has waited past `snapshot_timeout`
/// for a usable snapshot.
pub struct Reconciler<G: IdGen> {
    coordinator: Arc<ReplacementCoordinator<G>>,
    snapshot_timeout: Duration,
    watched: Mutex<HashMap<String, Instant>>,
}

impl<G: IdGen> Reconciler<G> {
    pub fn new(coordinator: Arc<ReplacementCoordinator<G>>, snapshot_timeout: Duration) -> Self {
        Self {
            coordinator,
            snapshot_timeout,
            watched: Mutex::new(HashMap::new()),
        }
    }

    /// Start (or refresh) watching `agent_id`'s in-flight flow.
    pub async fn watch(&self, agent_id: impl Into<String>) {
        self.watched.lock().await.insert(agent_id.into(), Instant::now());
    }

    /// Stop watching `agent_id` regardless of its flow's phase.
    pub async fn unwatch(&self, agent_id: &str) {
        self.watched.lock().await.remove(agent_id);
    }

    pub async fn watched_count(&self) -> usize {
        self.watched.lock().await.len()
    }

    /// Run one reconciliation pass over every watched agent.
    pub async fn tick(&self) {
        let watched: Vec<(String, Instant)> = self
            .watched
            .lock()
            .await
            .iter()
            .map(|(id, since)| (id.clone(), *since))
            .collect();

        for (agent_id, watching_since) in watched {
            let Some(flow) = self.coordinator.flow(&agent_id).await else {
                // No flow tracked (never started, or already dropped): stop watching.
                self.watched.lock().await.remove(&agent_id);
                continue;
            };

            if flow.phase.is_terminal() {
                self.watched.lock().await.remove(&agent_id);
                continue;
            }

            if watching_since.elapsed() > self.snapshot_timeout {
                warn!(agent_id = %agent_id, "snapshot wait timed out, forcing handoff");
                match self.coordinator.force_handoff(&agent_id, "snapshot_timeout").await {
                    Ok(_) => {
                        self.watched.lock().await.remove(&agent_id);
                    }
                    Err(err) => warn!(agent_id = %agent_id, error = %err, "force_handoff failed"),
                }
                continue;
            }

            if let Err(err) = self.coordinator.process_snapshot(&agent_id).await {
                warn!(agent_id = %agent_id, error = %err, "process_snapshot failed");
            }
        }
    }

    /// Run reconciliation on a fixed interval until cancelled.
    pub async fn run(self: Arc<Self>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            self.tick().await;
        }
    }
}
