// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the replacement engine.

use cp_core::CommandPostError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Storage(#[from] CommandPostError),

    #[error("replacement flow already exists for agent {0}")]
    FlowAlreadyExists(String),

    #[error("no active replacement flow for agent {0}")]
    NoActiveFlow(String),

    #[error("spawn executor failed for request {request_id}: {message}")]
    SpawnFailed { request_id: String, message: String },
}

pub type Result<T> = std::result::Result<T, EngineError>;
