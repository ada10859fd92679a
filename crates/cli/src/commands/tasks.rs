// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `cp tasks` — list tasks, optionally filtered by status, assignee, domain, or feature.

use anyhow::Result;
use clap::Args;
use cp_core::TaskStatus;
use cp_storage::{Paths, TaskFilter, TaskStore};

use crate::output::OutputFormat;
use crate::table::{Align, CellStyle, Column, Table};

#[derive(Args)]
pub struct TasksArgs {
    /// Filter by status (e.g. in_progress, completed)
    #[arg(long)]
    pub status: Option<String>,
    /// Filter by assignee agent id
    #[arg(long)]
    pub assigned_to: Option<String>,
    /// Filter by domain
    #[arg(long)]
    pub domain: Option<String>,
    /// Filter by feature
    #[arg(long)]
    pub feature: Option<String>,
}

pub async fn handle(args: TasksArgs, project_root: &std::path::Path, format: OutputFormat) -> Result<()> {
    let status = args
        .status
        .as_deref()
        .map(parse_status)
        .transpose()?;

    let filter = TaskFilter {
        status,
        assigned_to: args.assigned_to,
        domain: args.domain,
        feature: args.feature,
    };

    let paths = Paths::new(project_root);
    let clock = std::sync::Arc::new(cp_core::SystemClock);
    let tasks = TaskStore::new(paths, clock).list_tasks(&filter).await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&tasks)?);
        }
        OutputFormat::Text => {
            if tasks.is_empty() {
                println!("No tasks found.");
                return Ok(());
            }
            let mut table = Table::new(vec![
                Column::left("ID"),
                Column::left("TITLE").with_max(40),
                Column {
                    name: "STATUS",
                    align: Align::Left,
                    style: CellStyle::Status,
                    min_width: None,
                    max_width: None,
                },
                Column::left("ASSIGNED_TO"),
                Column::left("DOMAIN"),
            ]);
            for task in &tasks {
                table.row(vec![
                    task.id.to_string(),
                    task.title.clone(),
                    format!("{:?}", task.status),
                    task.assigned_to.clone().unwrap_or_else(|| "-".to_string()),
                    task.domain.clone(),
                ]);
            }
            let mut out = std::io::stdout();
            table.render(&mut out);
        }
    }

    Ok(())
}

fn parse_status(s: &str) -> Result<TaskStatus> {
    match s.to_lowercase().replace('-', "_").as_str() {
        "pending" => Ok(TaskStatus::Pending),
        "assigned" => Ok(TaskStatus::Assigned),
        "ready" => Ok(TaskStatus::Ready),
        "in_progress" => Ok(TaskStatus::InProgress),
        "blocked" => Ok(TaskStatus::Blocked),
        "ready_for_review" => Ok(TaskStatus::ReadyForReview),
        "in_review" => Ok(TaskStatus::InReview),
        "needs_revision" => Ok(TaskStatus::NeedsRevision),
        "approved" => Ok(TaskStatus::Approved),
        "completed" => Ok(TaskStatus::Completed),
        "failed" => Ok(TaskStatus::Failed),
        "error" => Ok(TaskStatus::Error),
        other => anyhow::bail!("unknown task status '{other}'"),
    }
}
