// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! cp - Command Post CLI

mod color;
mod commands;
mod output;
mod table;

use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use output::OutputFormat;

#[derive(Parser)]
#[command(name = "cp", version, about = "Command Post - agent lifecycle query surface")]
struct Cli {
    /// Change to <dir> before doing anything
    #[arg(short = 'C', global = true, value_name = "DIR")]
    directory: Option<PathBuf>,

    /// Output format
    #[arg(short = 'o', long = "output", value_enum, default_value_t, global = true)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show an overview of registered agents and task counts
    Status(commands::status::StatusArgs),
    /// List tasks, optionally filtered
    Tasks(commands::tasks::TasksArgs),
    /// Query the event log
    Events(commands::events::EventsArgs),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let matches = Cli::command().styles(color::styles()).get_matches();
    let cli = Cli::from_arg_matches(&matches)?;

    if let Some(ref dir) = cli.directory {
        let canonical = std::fs::canonicalize(dir)
            .map_err(|e| anyhow::anyhow!("cannot change to directory '{}': {}", dir.display(), e))?;
        std::env::set_current_dir(&canonical)
            .map_err(|e| anyhow::anyhow!("cannot change to directory '{}': {}", canonical.display(), e))?;
    }

    let project_root = find_project_root();
    let format = cli.output;

    match cli.command {
        Commands::Status(args) => commands::status::handle(args, &project_root, format).await?,
        Commands::Tasks(args) => commands::tasks::handle(args, &project_root, format).await?,
        Commands::Events(args) => commands::events::handle(args, &project_root, format).await?,
    }

    Ok(())
}

/// Find the project root by walking up from the current directory, looking
/// for a `.command-post` directory (`spec.md` §6). Falls back to
/// `CP_PROJECT_ROOT`, then the current directory itself.
fn find_project_root() -> PathBuf {
    if let Ok(dir) = std::env::var("CP_PROJECT_ROOT") {
        return PathBuf::from(dir);
    }

    let start = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let mut current = start.clone();
    loop {
        if current.join(".command-post").is_dir() {
            return current;
        }
        if !current.pop() {
            return start;
        }
    }
}
