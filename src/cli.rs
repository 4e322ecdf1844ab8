use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use thiserror::Error;

use crate::board::{Board, BoardError};
use crate::identity::{AuthError, Identity};
use crate::models::{Priority, Task, parse_tags};
use crate::stats::{self, StatsRange};
use crate::transfer;
use crate::utils::{format_duration, parse_date, today};

#[derive(Parser)]
#[command(name = "taskclock")]
#[command(about = "Daily tasks with a built-in stopwatch")]
#[command(version)]
pub struct Cli {
    /// Custom config file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Use development mode (uses separate dev config/database)
    #[arg(long)]
    pub dev: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Launch interactive TUI (default if no subcommand)
    Tui,
    /// Sign in as a user
    Login {
        name: String,
    },
    /// Sign out
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Add a task
    Add {
        /// Task title
        title: String,
        /// Date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<String>,
        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
        /// high, medium or low
        #[arg(long)]
        priority: Option<String>,
    },
    /// List tasks for a date
    List {
        /// Date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<String>,
        /// List every date
        #[arg(long, conflicts_with = "date")]
        all: bool,
    },
    /// Toggle a task's completion
    Done {
        /// Task id or unique id prefix
        id: String,
    },
    /// Delete a task
    Delete {
        id: String,
    },
    /// Move a task to a zero-based index within its date
    Move {
        id: String,
        index: usize,
    },
    /// Manage subtasks
    #[command(subcommand)]
    Subtask(SubtaskCommand),
    /// Set a task's description (empty text clears it)
    Describe {
        id: String,
        text: String,
    },
    /// Attach a link to a task
    Link {
        id: String,
        url: String,
    },
    /// Show statistics
    Stats {
        /// today, week or all
        #[arg(long, default_value = "today")]
        range: String,
    },
    /// Export every task as JSON
    Export {
        /// Output file, defaults to taskclock_export_<date>.json
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Import tasks from a JSON export
    Import {
        file: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum SubtaskCommand {
    /// Add a subtask
    Add { task_id: String, title: String },
    /// Toggle a subtask's completion
    Done { task_id: String, subtask_id: String },
    /// Delete a subtask
    Delete { task_id: String, subtask_id: String },
    /// Move a subtask to a zero-based index
    Move {
        task_id: String,
        subtask_id: String,
        index: usize,
    },
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    BoardError(#[from] BoardError),
    #[error("{0}")]
    AuthError(#[from] AuthError),
    #[error("Failed to parse date: {0}")]
    DateParseError(String),
    #[error("{0}")]
    InvalidArgument(String),
    #[error("No task matches '{0}'")]
    TaskNotFound(String),
    #[error("'{0}' matches more than one task, use a longer id")]
    AmbiguousId(String),
    #[error("Not signed in, run `taskclock login <name>` first")]
    NotSignedIn,
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

fn parse_date_arg(date: Option<&str>) -> Result<chrono::NaiveDate, CliError> {
    match date {
        Some(s) => parse_date(s).map_err(|e| CliError::DateParseError(format!("Invalid date format '{}': {}", s, e))),
        None => Ok(today()),
    }
}

/// First eight characters of an id, enough to address a task from the command line
pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// Resolve an id prefix to a full task id and select that task's date on the board
fn focus_task(board: &mut Board, prefix: &str) -> Result<String, CliError> {
    let matches: Vec<Task> = board
        .all_tasks()?
        .into_iter()
        .filter(|t| t.id.starts_with(prefix))
        .collect();
    match matches.as_slice() {
        [] => Err(CliError::TaskNotFound(prefix.to_string())),
        [task] => {
            board.set_selected_date(task.date)?;
            Ok(task.id.clone())
        }
        _ => Err(CliError::AmbiguousId(prefix.to_string())),
    }
}

fn focus_subtask(board: &Board, task_id: &str, prefix: &str) -> Result<String, CliError> {
    let task = board
        .task(task_id)
        .ok_or_else(|| CliError::TaskNotFound(task_id.to_string()))?;
    let matches: Vec<&str> = task
        .sub_tasks
        .iter()
        .map(|s| s.id.as_str())
        .filter(|id| id.starts_with(prefix))
        .collect();
    match matches.as_slice() {
        [] => Err(CliError::TaskNotFound(prefix.to_string())),
        [id] => Ok(id.to_string()),
        _ => Err(CliError::AmbiguousId(prefix.to_string())),
    }
}

fn write_task(out: &mut impl Write, task: &Task, show_date: bool) -> Result<(), CliError> {
    let check = if task.completed { "x" } else { " " };
    let mut line = format!("[{}] {}  {}", check, short_id(&task.id), task.title);
    if show_date {
        line = format!("{}  {}", task.date, line);
    }
    if let Some(priority) = task.priority {
        line.push_str(&format!("  !{}", priority));
    }
    for tag in &task.tags {
        line.push_str(&format!("  #{}", tag));
    }
    if task.time_spent > 0 {
        line.push_str(&format!("  ({})", format_duration(task.time_spent)));
    }
    writeln!(out, "{}", line)?;
    for subtask in task.ordered_subtasks() {
        let check = if subtask.completed { "x" } else { " " };
        writeln!(out, "      [{}] {}  {}", check, short_id(&subtask.id), subtask.title)?;
    }
    Ok(())
}

/// Run one non-interactive command against the board and identity
pub fn run_command(
    command: Commands,
    board: &mut Board,
    identity: &mut dyn Identity,
    out: &mut impl Write,
) -> Result<(), CliError> {
    match command {
        Commands::Tui => Err(CliError::InvalidArgument("the TUI is started by the binary".to_string())),
        Commands::Login { name } => {
            let user = identity.sign_in(&name)?;
            board.set_user(Some(user.clone()))?;
            writeln!(out, "Signed in as {} ({})", user.display_name, user.uid)?;
            Ok(())
        }
        Commands::Logout => {
            board.set_user(None)?;
            identity.sign_out()?;
            writeln!(out, "Signed out")?;
            Ok(())
        }
        Commands::Whoami => {
            match identity.current_user() {
                Some(user) => writeln!(out, "{} ({})", user.display_name, user.uid)?,
                None => writeln!(out, "Not signed in")?,
            }
            Ok(())
        }
        other => {
            if board.user().is_none() {
                return Err(CliError::NotSignedIn);
            }
            run_task_command(other, board, out)
        }
    }
}

fn run_task_command(command: Commands, board: &mut Board, out: &mut impl Write) -> Result<(), CliError> {
    match command {
        Commands::Add {
            title,
            date,
            tags,
            priority,
        } => {
            let date = parse_date_arg(date.as_deref())?;
            let priority = priority
                .map(|p| p.parse::<Priority>())
                .transpose()
                .map_err(CliError::InvalidArgument)?;
            let tags = tags.as_deref().map(parse_tags).unwrap_or_default();
            board.set_selected_date(date)?;
            let id = board.add_task(&title, tags, priority)?;
            writeln!(out, "Task created successfully (ID: {})", short_id(&id))?;
        }
        Commands::List { date, all } => {
            if all {
                let tasks = board.all_tasks()?;
                if tasks.is_empty() {
                    writeln!(out, "No tasks")?;
                }
                for task in &tasks {
                    write_task(out, task, true)?;
                }
            } else {
                let date = parse_date_arg(date.as_deref())?;
                board.set_selected_date(date)?;
                writeln!(out, "{}", date.format("%A, %B %-d, %Y"))?;
                if board.tasks().is_empty() {
                    writeln!(out, "No tasks")?;
                }
                for task in board.tasks() {
                    write_task(out, task, false)?;
                }
            }
        }
        Commands::Done { id } => {
            let id = focus_task(board, &id)?;
            let completed = board.toggle_completion(&id)?;
            let state = if completed { "completed" } else { "reopened" };
            writeln!(out, "Task {} {}", short_id(&id), state)?;
        }
        Commands::Delete { id } => {
            let id = focus_task(board, &id)?;
            board.delete_task(&id)?;
            writeln!(out, "Task {} deleted", short_id(&id))?;
        }
        Commands::Move { id, index } => {
            let id = focus_task(board, &id)?;
            if index >= board.tasks().len() {
                return Err(CliError::InvalidArgument(format!(
                    "index {} is out of range (0..{})",
                    index,
                    board.tasks().len()
                )));
            }
            if board.move_task(&id, index)? {
                writeln!(out, "Task {} moved to {}", short_id(&id), index)?;
            } else {
                writeln!(out, "Task {} already at {}", short_id(&id), index)?;
            }
        }
        Commands::Subtask(subcommand) => run_subtask_command(subcommand, board, out)?,
        Commands::Describe { id, text } => {
            let id = focus_task(board, &id)?;
            board.set_description(&id, &text)?;
            writeln!(out, "Description updated")?;
        }
        Commands::Link { id, url } => {
            let id = focus_task(board, &id)?;
            board.add_link(&id, &url)?;
            writeln!(out, "Link added")?;
        }
        Commands::Stats { range } => {
            let range: StatsRange = range.parse().map_err(CliError::InvalidArgument)?;
            let stats = stats::compute(&board.all_tasks()?, range, today());
            writeln!(out, "{}", range)?;
            writeln!(out, "  Tasks:           {}", stats.total)?;
            writeln!(out, "  Completed:       {} ({}%)", stats.completed, stats.completion_rate)?;
            writeln!(out, "  Time spent:      {}", format_duration(stats.total_time))?;
            writeln!(out, "  Average / task:  {}", format_duration(stats.average_time))?;
            for (priority, group) in &stats.by_priority {
                writeln!(out, "  !{:<14} {}/{}", priority, group.completed, group.total)?;
            }
            for (tag, group) in &stats.by_tag {
                writeln!(out, "  #{:<14} {}/{}", tag, group.completed, group.total)?;
            }
        }
        Commands::Export { output } => {
            let (json, count) = board.export_json()?;
            let path = output.unwrap_or_else(|| PathBuf::from(transfer::export_file_name(today())));
            std::fs::write(&path, json)?;
            writeln!(out, "{} tasks have been exported to {}", count, path.display())?;
        }
        Commands::Import { file } => {
            let json = std::fs::read_to_string(&file)?;
            let count = board.import_json(&json)?;
            writeln!(out, "Imported {} tasks", count)?;
        }
        Commands::Tui | Commands::Login { .. } | Commands::Logout | Commands::Whoami => {}
    }
    Ok(())
}

fn run_subtask_command(command: SubtaskCommand, board: &mut Board, out: &mut impl Write) -> Result<(), CliError> {
    match command {
        SubtaskCommand::Add { task_id, title } => {
            let task_id = focus_task(board, &task_id)?;
            let id = board.add_subtask(&task_id, &title)?;
            writeln!(out, "Subtask created successfully (ID: {})", short_id(&id))?;
        }
        SubtaskCommand::Done { task_id, subtask_id } => {
            let task_id = focus_task(board, &task_id)?;
            let subtask_id = focus_subtask(board, &task_id, &subtask_id)?;
            let completed = board.toggle_subtask(&task_id, &subtask_id)?;
            let state = if completed { "completed" } else { "reopened" };
            writeln!(out, "Subtask {} {}", short_id(&subtask_id), state)?;
        }
        SubtaskCommand::Delete { task_id, subtask_id } => {
            let task_id = focus_task(board, &task_id)?;
            let subtask_id = focus_subtask(board, &task_id, &subtask_id)?;
            board.delete_subtask(&task_id, &subtask_id)?;
            writeln!(out, "Subtask {} deleted", short_id(&subtask_id))?;
        }
        SubtaskCommand::Move {
            task_id,
            subtask_id,
            index,
        } => {
            let task_id = focus_task(board, &task_id)?;
            let subtask_id = focus_subtask(board, &task_id, &subtask_id)?;
            let from = board
                .task(&task_id)
                .and_then(|t| t.ordered_subtasks().iter().position(|s| s.id == subtask_id))
                .ok_or_else(|| CliError::TaskNotFound(subtask_id.clone()))?;
            board.reorder_subtasks(&task_id, from, index)?;
            writeln!(out, "Subtask {} moved to {}", short_id(&subtask_id), index)?;
        }
    }
    Ok(())
}
