// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event log: append-only JSONL at `events/events.jsonl` (`spec.md` §4.4).
//!
//! Readers must tolerate a line written by a future version of this
//! format, or a line truncated by a crash mid-write; `query_events` skips
//! any line that doesn't parse rather than failing the whole query.

use crate::lock::with_default_lock;
use crate::paths::Paths;
use cp_core::{CommandPostError, Event, EventFilter};
use std::io::Write;
use tracing::warn;

/// Maximum serialized size of a single event, per `spec.md` §4.4.
pub const MAX_EVENT_BYTES: usize = 4 * 1024;

pub struct EventLog {
    paths: Paths,
}

impl EventLog {
    pub fn new(paths: Paths) -> Self {
        Self { paths }
    }

    fn path(&self) -> std::path::PathBuf {
        self.paths.events()
    }

    /// Appends `event` as a single JSON line. Rejects events that would
    /// serialize past [`MAX_EVENT_BYTES`] before touching the file.
    pub async fn append_event(&self, event: Event) -> Result<(), CommandPostError> {
        let mut line = serde_json::to_vec(&event).map_err(|e| CommandPostError::FileSystem {
            file_path: self.path(),
            cause: e.to_string(),
        })?;
        if line.len() > MAX_EVENT_BYTES {
            return Err(CommandPostError::validation(
                "event",
                vec![format!(
                    "serialized event is {} bytes, exceeds the {}-byte limit",
                    line.len(),
                    MAX_EVENT_BYTES
                )],
            ));
        }
        line.push(b'\n');

        let path = self.path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CommandPostError::FileSystem {
                file_path: path.clone(),
                cause: e.to_string(),
            })?;
        }
        if !path.exists() {
            std::fs::File::create(&path).map_err(|e| CommandPostError::FileSystem {
                file_path: path.clone(),
                cause: e.to_string(),
            })?;
        }

        with_default_lock(&path, move || -> Result<(), CommandPostError> {
            let mut file = std::fs::OpenOptions::new()
                .append(true)
                .open(&path)
                .map_err(|e| CommandPostError::FileSystem {
                    file_path: path.clone(),
                    cause: e.to_string(),
                })?;
            file.write_all(&line).map_err(|e| CommandPostError::FileSystem {
                file_path: path.clone(),
                cause: e.to_string(),
            })
        })
        .await?
    }

    /// Streams every event matching `filter`, skipping (and warning about)
    /// any line that fails to parse as an [`Event`].
    pub async fn query_events(&self, filter: &EventFilter) -> Result<Vec<Event>, CommandPostError> {
        let path = self.path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let contents = std::fs::read_to_string(&path).map_err(|e| CommandPostError::FileSystem {
            file_path: path.clone(),
            cause: e.to_string(),
        })?;

        let mut events = Vec::new();
        for (line_no, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Event>(line) {
                Ok(event) => {
                    if filter.matches(&event) {
                        events.push(event);
                    }
                }
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        line = line_no + 1,
                        error = %e,
                        "skipping malformed event log line"
                    );
                }
            }
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cp_core::{EventId, LifecycleEventKind};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn log() -> (tempfile::TempDir, EventLog) {
        let dir = tempdir().unwrap();
        let log = EventLog::new(Paths::new(dir.path()));
        (dir, log)
    }

    fn sample_event(id: &str, kind: LifecycleEventKind, agent_id: &str) -> Event {
        Event::lifecycle(
            EventId::new(id),
            chrono::Utc::now(),
            kind,
            Some(agent_id.to_string()),
            serde_json::json!({}),
        )
    }

    #[tokio::test]
    async fn append_then_query_roundtrip() {
        let (_dir, log) = log();
        log.append_event(sample_event("evt-1", LifecycleEventKind::ReplacementInitiated, "worker-1"))
            .await
            .unwrap();
        let events = log.query_events(&EventFilter::default()).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_id, EventId::new("evt-1"));
    }

    #[tokio::test]
    async fn query_missing_log_returns_empty() {
        let (_dir, log) = log();
        assert_eq!(log.query_events(&EventFilter::default()).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn query_filters_by_agent_and_event_type() {
        let (_dir, log) = log();
        log.append_event(sample_event("evt-1", LifecycleEventKind::ContextUsageWarning, "worker-1"))
            .await
            .unwrap();
        log.append_event(sample_event("evt-2", LifecycleEventKind::ContextUsageWarning, "worker-2"))
            .await
            .unwrap();
        log.append_event(sample_event("evt-3", LifecycleEventKind::ReplacementInitiated, "worker-1"))
            .await
            .unwrap();

        let filter = EventFilter {
            agent_id: Some("worker-1".into()),
            event_type: Some("context_usage_warning".into()),
            start_time: None,
        };
        let events = log.query_events(&filter).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_id, EventId::new("evt-1"));
    }

    #[tokio::test]
    async fn query_skips_malformed_lines() {
        let (dir, log) = log();
        log.append_event(sample_event("evt-1", LifecycleEventKind::ReplacementInitiated, "worker-1"))
            .await
            .unwrap();
        let path = Paths::new(dir.path()).events();
        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{not valid json\n").unwrap();

        let events = log.query_events(&EventFilter::default()).await.unwrap();
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn append_event_rejects_oversized_payload() {
        let (_dir, log) = log();
        let big = "x".repeat(MAX_EVENT_BYTES + 1);
        let event = Event::lifecycle(
            EventId::new("evt-1"),
            chrono::Utc::now(),
            LifecycleEventKind::ReplacementInitiated,
            Some("worker-1".into()),
            serde_json::json!({"payload": big}),
        );
        let err = log.append_event(event).await.unwrap_err();
        assert!(matches!(err, CommandPostError::Validation { .. }));
    }

    #[tokio::test]
    async fn concurrent_appends_all_land() {
        let (_dir, log) = log();
        let log = Arc::new(log);
        let mut handles = Vec::new();
        for i in 0..8 {
            let log = log.clone();
            handles.push(tokio::spawn(async move {
                log.append_event(sample_event(
                    &format!("evt-{i}"),
                    LifecycleEventKind::ReplacementInitiated,
                    "worker-1",
                ))
                .await
                .unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        let events = log.query_events(&EventFilter::default()).await.unwrap();
        assert_eq!(events.len(), 8);
    }
}
