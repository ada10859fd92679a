// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `SpawnExecutor` contract (`spec.md` §6): the one external
//! collaborator the replacement coordinator calls out to in order to
//! actually start a replacement agent's process. Concrete implementations
//! live in `cp-adapters`; this crate only depends on the trait.

use cp_storage::SpawnRequestRecord;

/// Result of a single [`SpawnExecutor::spawn`] call. `success` is the only
/// field the coordinator interprets: it means the replacement process has
/// started and will read its instructions file, nothing stronger.
#[derive(Debug, Clone)]
pub struct SpawnResult {
    pub success: bool,
    pub request_id: String,
    pub error: Option<String>,
}

impl SpawnResult {
    pub fn ok(request_id: impl Into<String>) -> Self {
        Self {
            success: true,
            request_id: request_id.into(),
            error: None,
        }
    }

    pub fn failed(request_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            request_id: request_id.into(),
            error: Some(error.into()),
        }
    }
}

/// Injected collaborator that starts a replacement agent's process given a
/// prepared spawn request. Implementations may open a new multiplexer
/// session, launch a container, or anything else that ends with the
/// replacement's runner reading its instructions file.
#[async_trait::async_trait]
pub trait SpawnExecutor: Send + Sync {
    async fn spawn(&self, request: &SpawnRequestRecord) -> SpawnResult;
}
