use colored::Colorize;

use crate::error::Result;
use crate::model::{Metadata, PlanAction, TaskStatus, TaskUpdate};
use crate::output::{self, Format};
use crate::store::repo::Crew;
use crate::store::tasks::NewTask;

/// Parse a `--metadata` argument, a JSON object.
pub fn parse_metadata(raw: &str) -> Result<Metadata> {
    Ok(serde_json::from_str(raw)?)
}

pub fn create(crew: &Crew, team: &str, new: NewTask, format: Format) -> Result<()> {
    let task = crew.tasks.create_task(team, new)?;
    output::print_task(&task, format)
}

pub fn list(
    crew: &Crew,
    team: &str,
    status: Option<TaskStatus>,
    owner: Option<&str>,
    format: Format,
) -> Result<()> {
    let tasks: Vec<_> = crew
        .tasks
        .list_tasks(team)?
        .into_iter()
        .filter(|t| status.is_none_or(|s| t.status == s))
        .filter(|t| owner.is_none_or(|o| t.owner.as_deref() == Some(o)))
        .collect();
    output::print_tasks(&tasks, format)
}

pub fn show(crew: &Crew, team: &str, id: &str, format: Format) -> Result<()> {
    let task = crew.tasks.read_task(team, id, None)?;
    output::print_task(&task, format)
}

pub fn update(
    crew: &Crew,
    team: &str,
    id: &str,
    update: TaskUpdate,
    retries: Option<u32>,
    format: Format,
) -> Result<()> {
    let task = crew.tasks.update_task(team, id, update, retries)?;
    output::print_task(&task, format)
}

pub fn plan(crew: &Crew, team: &str, id: &str, plan: &str, format: Format) -> Result<()> {
    let task = crew.tasks.submit_plan(team, id, plan)?;
    output::print_task(&task, format)
}

pub fn evaluate(
    crew: &Crew,
    team: &str,
    id: &str,
    action: PlanAction,
    feedback: Option<&str>,
    format: Format,
) -> Result<()> {
    let task = crew.tasks.evaluate_plan(team, id, action, feedback, None)?;
    output::print_task(&task, format)
}

pub fn reset_owner(crew: &Crew, team: &str, agent: &str, format: Format) -> Result<()> {
    let released = crew.tasks.reset_owner_tasks(team, agent)?;
    match format {
        Format::Json => output::print_json(&released)?,
        Format::Pretty => {
            if released.is_empty() {
                println!("No tasks owned by '{}'", agent.cyan());
            }
            for task in &released {
                println!("Released task {} ({})", task.id, task.subject);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn metadata_must_be_an_object() {
        let meta = parse_metadata(r#"{"priority": 2, "stale": null}"#).unwrap();
        assert_eq!(meta.get("priority"), Some(&json!(2)));
        assert!(meta.contains_key("stale"));
        assert!(parse_metadata("[1, 2]").is_err());
    }
}
