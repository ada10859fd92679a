// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `cp events` — query the append-only event log.

use anyhow::Result;
use clap::Args;
use cp_core::EventFilter;
use cp_storage::{EventLog, Paths};

use crate::output::OutputFormat;
use crate::table::{Column, Table};

#[derive(Args)]
pub struct EventsArgs {
    /// Filter by agent id
    #[arg(long)]
    pub agent_id: Option<String>,
    /// Filter by event type (e.g. replacement_initiated)
    #[arg(long)]
    pub event_type: Option<String>,
    /// Only events at or after this RFC 3339 timestamp
    #[arg(long)]
    pub since: Option<chrono::DateTime<chrono::Utc>>,
}

pub async fn handle(args: EventsArgs, project_root: &std::path::Path, format: OutputFormat) -> Result<()> {
    let filter = EventFilter {
        agent_id: args.agent_id,
        event_type: args.event_type,
        start_time: args.since,
    };

    let events = EventLog::new(Paths::new(project_root)).query_events(&filter).await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&events)?);
        }
        OutputFormat::Text => {
            if events.is_empty() {
                println!("No events found.");
                return Ok(());
            }
            let mut table = Table::new(vec![
                Column::left("TIME"),
                Column::left("TYPE"),
                Column::left("AGENT"),
                Column::left("DATA").with_max(60),
            ]);
            for event in &events {
                table.row(vec![
                    event.timestamp.to_rfc3339(),
                    event.event_type.clone(),
                    event.agent_id.clone().unwrap_or_else(|| "-".to_string()),
                    event.data.to_string(),
                ]);
            }
            let mut out = std::io::stdout();
            table.render(&mut out);
        }
    }

    Ok(())
}
