// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cp-storage: the file-backed coordination primitives and per-entity
//! stores the replacement engine is built on (`spec.md` §4.1-§4.5, §4.9).
//!
//! Dependency order, leaves first: paths → atomic write → per-path lock →
//! event log → inbox store / task store / registry → snapshot store →
//! spawn request store.

pub mod atomic;
pub mod event_log;
pub mod inbox;
pub mod lock;
pub mod paths;
pub mod registry;
pub mod snapshot_store;
pub mod spawn_request;
pub mod task_store;

pub use atomic::{atomic_write, ensure_exists};
pub use event_log::{EventLog, MAX_EVENT_BYTES};
pub use inbox::{InboxStore, MessageFilter, NewMessage, SendOptions};
pub use lock::{with_default_lock, with_file_lock, LockConfig};
pub use paths::Paths;
pub use registry::AgentRegistry;
pub use snapshot_store::SnapshotStore;
pub use spawn_request::{SpawnRequestRecord, SpawnRequestStore};
pub use task_store::{TaskFilter, TaskPatch, TaskStore};
