use colored::Colorize;

use crate::agent;
use crate::error::{CrewError, Result};
use crate::model::{Member, MemberUpdate};
use crate::output::{self, Format};
use crate::store::paths::sanitize;
use crate::store::repo::Crew;
use crate::store::team::NewTeam;

pub fn create(
    crew: &Crew,
    team: &str,
    session_id: Option<String>,
    options: NewTeam,
    format: Format,
) -> Result<()> {
    let session_id = session_id.unwrap_or_else(agent::generate_agent_id);
    let lead_agent_id = agent::generate_agent_id();
    let config = crew
        .teams
        .create_team(team, &session_id, &lead_agent_id, options)?;
    output::print_team(&config, format)
}

pub fn show(crew: &Crew, team: &str, format: Format) -> Result<()> {
    let config = crew.teams.read_config(team)?;
    output::print_team(&config, format)
}

pub fn delete(crew: &Crew, team: &str, format: Format) -> Result<()> {
    crew.delete_team(team)?;
    match format {
        Format::Json => println!("{}", serde_json::json!({ "deleted": team })),
        Format::Pretty => println!("Deleted team '{}'", team.cyan()),
    }
    Ok(())
}

/// Fields accepted by `team add-member`.
#[derive(Debug, Clone, Default)]
pub struct NewMember {
    pub name: String,
    pub agent_id: Option<String>,
    pub model: Option<String>,
    pub cwd: Option<String>,
    pub prompt: Option<String>,
    pub color: Option<String>,
    pub plan_mode_required: bool,
}

pub fn add_member(crew: &Crew, team: &str, new: NewMember, format: Format) -> Result<()> {
    sanitize(&new.name)?;
    if crew.teams.find_member(team, &new.name)?.is_some() {
        return Err(CrewError::InvalidState(format!(
            "{} is already a member of {team}",
            new.name
        )));
    }

    let cwd = match new.cwd {
        Some(cwd) => cwd,
        None => std::env::current_dir()?.display().to_string(),
    };
    let agent_id = new.agent_id.unwrap_or_else(agent::generate_agent_id);
    let member = Member {
        model: new.model,
        prompt: new.prompt,
        color: new.color,
        plan_mode_required: new.plan_mode_required.then_some(true),
        is_active: Some(false),
        ..Member::teammate(agent_id, new.name, cwd)
    };

    crew.teams.add_member(team, member.clone())?;
    match format {
        Format::Json => output::print_json(&member)?,
        Format::Pretty => println!("Added '{}' to {}", member.name.cyan(), team),
    }
    Ok(())
}

pub fn update_member(
    crew: &Crew,
    team: &str,
    name: &str,
    update: MemberUpdate,
    format: Format,
) -> Result<()> {
    // The store ignores unknown members; the command does not.
    if crew.teams.find_member(team, name)?.is_none() {
        return Err(CrewError::MemberNotFound(name.to_string()));
    }
    crew.teams.update_member(team, name, update)?;
    let member = crew
        .teams
        .find_member(team, name)?
        .ok_or_else(|| CrewError::MemberNotFound(name.to_string()))?;
    match format {
        Format::Json => output::print_json(&member)?,
        Format::Pretty => println!("Updated '{}'", member.name.cyan()),
    }
    Ok(())
}

pub fn retire(crew: &Crew, team: &str, name: &str, format: Format) -> Result<()> {
    let released = crew.retire_member(team, name)?;
    match format {
        Format::Json => println!(
            "{}",
            serde_json::json!({ "retired": name, "releasedTasks": released })
        ),
        Format::Pretty => {
            println!("Retired '{}' from {}", name.cyan(), team);
            for task in &released {
                println!("  {} task {} ({})", "released".dimmed(), task.id, task.subject);
            }
        }
    }
    Ok(())
}
