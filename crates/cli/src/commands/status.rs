// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `cp status` — overview of registered agents and task counts by status.

use anyhow::Result;
use clap::Args;
use cp_core::AgentStatus;
use cp_storage::{AgentRegistry, Paths, TaskFilter, TaskStore};

use crate::output::{format_time_ago, OutputFormat};
use crate::table::{Align, CellStyle, Column, Table};

#[derive(Args)]
pub struct StatusArgs {}

pub async fn handle(_args: StatusArgs, project_root: &std::path::Path, format: OutputFormat) -> Result<()> {
    let paths = Paths::new(project_root);
    let registry = AgentRegistry::new(paths.clone());
    let clock = std::sync::Arc::new(cp_core::SystemClock);
    let tasks = TaskStore::new(paths, clock);

    let agents = registry.list().await?;
    let task_list = tasks.list_tasks(&TaskFilter::default()).await?;

    match format {
        OutputFormat::Json => {
            let agents_json: Vec<serde_json::Value> = agents
                .iter()
                .map(|(id, entry)| {
                    serde_json::json!({
                        "agent_id": id,
                        "role": entry.role,
                        "domain": entry.domain,
                        "status": entry.status,
                        "task_id": entry.task_id,
                        "handoff_count": entry.handoff_count,
                    })
                })
                .collect();
            let mut by_status = std::collections::BTreeMap::<String, usize>::new();
            for task in &task_list {
                *by_status.entry(format!("{:?}", task.status)).or_default() += 1;
            }
            let obj = serde_json::json!({
                "agents": agents_json,
                "tasks_by_status": by_status,
            });
            println!("{}", serde_json::to_string_pretty(&obj)?);
        }
        OutputFormat::Text => {
            if agents.is_empty() {
                println!("No agents registered.");
            } else {
                let mut table = Table::new(vec![
                    Column::left("AGENT"),
                    Column::left("ROLE"),
                    Column::left("DOMAIN"),
                    Column {
                        name: "STATUS",
                        align: Align::Left,
                        style: CellStyle::Status,
                        min_width: None,
                        max_width: None,
                    },
                    Column::left("LAUNCHED"),
                ]);
                for (id, entry) in &agents {
                    table.row(vec![
                        id.clone(),
                        entry.role.clone(),
                        entry.domain.clone(),
                        status_label(entry.status),
                        format_time_ago(entry.launched_at),
                    ]);
                }
                let mut out = std::io::stdout();
                table.render(&mut out);
            }

            println!();
            println!("{} task(s) tracked", task_list.len());
            let mut by_status = std::collections::BTreeMap::<String, usize>::new();
            for task in &task_list {
                *by_status.entry(format!("{:?}", task.status)).or_default() += 1;
            }
            for (status, count) in &by_status {
                println!("  {status}: {count}");
            }
        }
    }

    Ok(())
}

fn status_label(status: AgentStatus) -> String {
    match status {
        AgentStatus::Active => "active".to_string(),
        AgentStatus::Dead => "dead".to_string(),
        AgentStatus::Replaced => "replaced".to_string(),
    }
}
