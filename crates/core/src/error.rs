// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The five error kinds shared across every Command Post crate.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur anywhere in the engine.
///
/// Five kinds per the error handling design: validation, filesystem, lock
/// timeout, not-found, and a catch-all for domain errors (duplicate flow,
/// illegal transition, unknown role) that carry just a message.
#[derive(Debug, Error)]
pub enum CommandPostError {
    #[error("validation failed for {path}: {}", .details.join("; "))]
    Validation { path: String, details: Vec<String> },

    #[error("filesystem error at {file_path}: {cause}")]
    FileSystem { file_path: PathBuf, cause: String },

    #[error("timed out acquiring lock on {0}")]
    LockTimeout(PathBuf),

    #[error("{resource_type} not found: {resource_id}")]
    NotFound {
        resource_type: &'static str,
        resource_id: String,
    },

    #[error("{0}")]
    Domain(String),
}

impl CommandPostError {
    pub fn validation(path: impl Into<String>, details: Vec<String>) -> Self {
        Self::Validation {
            path: path.into(),
            details,
        }
    }

    pub fn not_found(resource_type: &'static str, resource_id: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type,
            resource_id: resource_id.into(),
        }
    }

    pub fn domain(message: impl Into<String>) -> Self {
        Self::Domain(message.into())
    }
}

pub type Result<T> = std::result::Result<T, CommandPostError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_joins_details() {
        let err = CommandPostError::validation(
            "inbox.to",
            vec!["unknown agent".to_string(), "not a worker".to_string()],
        );
        assert_eq!(
            err.to_string(),
            "validation failed for inbox.to: unknown agent; not a worker"
        );
    }

    #[test]
    fn not_found_formats_kind_and_id() {
        let err = CommandPostError::not_found("task", "task-7");
        assert_eq!(err.to_string(), "task not found: task-7");
    }
}
