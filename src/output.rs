use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;

use crate::error::Result;
use crate::model::{AgentRuntimeStatus, InboxMessage, TaskFile, TaskStatus, TeamConfig};
use crate::store::inbox::BroadcastReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Json,
    Pretty,
}

/// Compact single-line JSON, the machine-readable form of every command.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

fn status_label(status: TaskStatus) -> String {
    let s = status.to_string();
    match status {
        TaskStatus::Pending => s.normal().to_string(),
        TaskStatus::Planning => s.yellow().to_string(),
        TaskStatus::InProgress => s.cyan().to_string(),
        TaskStatus::Completed => s.green().to_string(),
        TaskStatus::Deleted => s.red().to_string(),
    }
}

pub fn print_task(task: &TaskFile, format: Format) -> Result<()> {
    match format {
        Format::Json => print_json(task)?,
        Format::Pretty => {
            println!("[{}] {} ({})", task.id, task.subject.bold(), status_label(task.status));
            if !task.description.is_empty() {
                println!("  {}", task.description);
            }
            if let Some(ref owner) = task.owner {
                println!("  owner: {}", owner);
            }
            if !task.blocked_by.is_empty() {
                println!("  blocked by: {}", task.blocked_by.join(", "));
            }
            if !task.blocks.is_empty() {
                println!("  blocks: {}", task.blocks.join(", "));
            }
            if let Some(ref plan) = task.plan {
                println!("  plan: {}", plan);
            }
            if let Some(feedback) = task.plan_feedback.as_deref().filter(|f| !f.is_empty()) {
                println!("  feedback: {}", feedback);
            }
        }
    }
    Ok(())
}

pub fn print_tasks(tasks: &[TaskFile], format: Format) -> Result<()> {
    match format {
        Format::Json => print_json(tasks)?,
        Format::Pretty => {
            println!("{:>4} {:12} {:10} SUBJECT", "ID", "STATUS", "OWNER");
            println!("{}", "-".repeat(50));
            for task in tasks {
                let owner = task.owner.as_deref().unwrap_or("-");
                println!(
                    "{:>4} {:12} {:10} {}",
                    task.id,
                    task.status.to_string(),
                    owner,
                    truncate(&task.subject, 40)
                );
            }
        }
    }
    Ok(())
}

pub fn print_team(config: &TeamConfig, format: Format) -> Result<()> {
    match format {
        Format::Json => print_json(config)?,
        Format::Pretty => {
            println!("{}", config.name.bold());
            if !config.description.is_empty() {
                println!("  {}", config.description);
            }
            if let Some(ref model) = config.default_model {
                println!("  default model: {}", model);
            }
            for member in &config.members {
                let model = member.model.as_deref().unwrap_or("-");
                println!("  - {} ({}, model: {})", member.name, member.agent_type, model);
            }
        }
    }
    Ok(())
}

pub fn print_messages(messages: &[InboxMessage], format: Format) -> Result<()> {
    match format {
        Format::Json => print_json(messages)?,
        Format::Pretty => {
            if messages.is_empty() {
                println!("(no messages)");
            }
            for m in messages {
                let marker = if m.read { " " } else { "*" };
                println!(
                    "{} {} {}: {}",
                    marker,
                    m.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    m.from.bold(),
                    m.text
                );
            }
        }
    }
    Ok(())
}

pub fn print_broadcast(report: &BroadcastReport, format: Format) -> Result<()> {
    match format {
        Format::Json => print_json(report)?,
        Format::Pretty => {
            println!("delivered to {} member(s)", report.delivered.len());
            for failure in &report.failed {
                println!("  {} {}: {}", "failed".red(), failure.recipient, failure.error);
            }
        }
    }
    Ok(())
}

pub fn print_runtime(status: Option<&AgentRuntimeStatus>, format: Format) -> Result<()> {
    match format {
        Format::Json => print_json(&status)?,
        Format::Pretty => match status {
            None => println!("(no runtime status)"),
            Some(s) => {
                println!("{} @ {}", s.agent_name.bold(), s.team_name);
                if let Some(pid) = s.pid {
                    println!("  pid: {pid}");
                }
                println!("  ready: {}", s.ready.unwrap_or(false));
                if let Some(at) = s.last_heartbeat_at {
                    println!("  last heartbeat: {at}");
                }
                if let Some(ref err) = s.last_error {
                    println!("  last error: {}", err.red());
                }
            }
        },
    }
    Ok(())
}

pub fn truncate(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        let truncated: String = text.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_text() {
        assert_eq!(truncate("short", 10), "short");
    }

    #[test]
    fn truncate_counts_chars_not_bytes() {
        assert_eq!(truncate("ééééééééééé", 6), "ééé...");
    }
}
