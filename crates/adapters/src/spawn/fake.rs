// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake spawn executor for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use async_trait::async_trait;
use cp_engine::{SpawnExecutor, SpawnResult};
use cp_storage::SpawnRequestRecord;
use std::sync::Mutex;

struct State {
    requests: Vec<SpawnRequestRecord>,
    succeed: bool,
    error: String,
}

/// Records every request it receives and returns a scripted result.
/// Defaults to succeeding; call [`FakeSpawnExecutor::fail_with`] to script
/// a failure for subsequent calls.
pub struct FakeSpawnExecutor {
    state: Mutex<State>,
}

impl Default for FakeSpawnExecutor {
    fn default() -> Self {
        Self {
            state: Mutex::new(State {
                requests: Vec::new(),
                succeed: true,
                error: String::new(),
            }),
        }
    }
}

impl FakeSpawnExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts every subsequent `spawn` call to fail with `error`.
    pub fn fail_with(&self, error: impl Into<String>) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.succeed = false;
        state.error = error.into();
    }

    /// Reverts to the default succeeding behavior.
    pub fn succeed(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.succeed = true;
    }

    /// All requests handed to `spawn` so far, in order.
    pub fn requests(&self) -> Vec<SpawnRequestRecord> {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).requests.clone()
    }
}

#[async_trait]
impl SpawnExecutor for FakeSpawnExecutor {
    async fn spawn(&self, request: &SpawnRequestRecord) -> SpawnResult {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.requests.push(request.clone());

        if state.succeed {
            SpawnResult::ok(request.request_id.clone())
        } else {
            SpawnResult::failed(request.request_id.clone(), state.error.clone())
        }
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
