use std::fs;

use crate::error::{CrewError, Result};
use crate::model::{AgentType, Member, MemberUpdate, TeamConfig, now_ms};
use crate::store::files::{read_json, write_json};
use crate::store::lock;
use crate::store::paths::Layout;

/// Name given to the lead member of every team.
pub const LEAD_NAME: &str = "team-lead";

/// Optional settings for [`TeamStore::create_team`].
#[derive(Debug, Clone, Default)]
pub struct NewTeam {
    pub description: String,
    pub default_model: Option<String>,
    pub separate_windows: Option<bool>,
}

/// Team rosters under `teams/<team>/config.json`.
#[derive(Debug, Clone)]
pub struct TeamStore {
    layout: Layout,
}

impl TeamStore {
    pub fn new(layout: Layout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Unlocked existence check; a concurrent create or delete may race it.
    pub fn team_exists(&self, team: &str) -> Result<bool> {
        Ok(self.layout.config_path(team)?.exists())
    }

    /// Create the team and task directories and write a roster holding only
    /// the lead. Not locked, and an existing roster is overwritten.
    pub fn create_team(
        &self,
        team: &str,
        session_id: &str,
        lead_agent_id: &str,
        options: NewTeam,
    ) -> Result<TeamConfig> {
        fs::create_dir_all(self.layout.team_dir(team)?)?;
        fs::create_dir_all(self.layout.task_dir(team)?)?;

        let now = now_ms();
        let cwd = std::env::current_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        let lead = Member {
            agent_type: AgentType::Lead,
            tmux_pane_id: std::env::var("TMUX_PANE").unwrap_or_default(),
            model: options.default_model.clone(),
            joined_at: now,
            ..Member::teammate(lead_agent_id, LEAD_NAME, cwd)
        };

        let config = TeamConfig {
            name: team.to_string(),
            description: options.description,
            created_at: now,
            lead_agent_id: lead_agent_id.to_string(),
            lead_session_id: session_id.to_string(),
            members: vec![lead],
            default_model: options.default_model,
            separate_windows: options.separate_windows,
        };

        write_json(&self.layout.config_path(team)?, &config)?;
        tracing::debug!(team, "created team");
        Ok(config)
    }

    pub fn read_config(&self, team: &str) -> Result<TeamConfig> {
        let path = self.layout.config_path(team)?;
        if !path.exists() {
            return Err(CrewError::TeamNotFound(team.to_string()));
        }
        lock::with_lock(&path, || read_json(&path))
    }

    /// Look up one member by name.
    pub fn find_member(&self, team: &str, agent: &str) -> Result<Option<Member>> {
        let config = self.read_config(team)?;
        Ok(config.members.into_iter().find(|m| m.name == agent))
    }

    pub fn add_member(&self, team: &str, member: Member) -> Result<()> {
        self.modify(team, |config| {
            config.members.push(member);
            true
        })
    }

    pub fn remove_member(&self, team: &str, agent: &str) -> Result<()> {
        self.modify(team, |config| {
            config.members.retain(|m| m.name != agent);
            true
        })
    }

    /// Merge `update` into the named member. Unknown members are ignored.
    pub fn update_member(&self, team: &str, agent: &str, update: MemberUpdate) -> Result<()> {
        self.modify(team, |config| {
            match config.members.iter_mut().find(|m| m.name == agent) {
                Some(member) => {
                    member.apply(update);
                    true
                }
                None => false,
            }
        })
    }

    /// Remove the roster and the task directory.
    pub fn delete_team(&self, team: &str) -> Result<()> {
        let team_dir = self.layout.team_dir(team)?;
        let task_dir = self.layout.task_dir(team)?;
        if !team_dir.exists() && !task_dir.exists() {
            return Err(CrewError::TeamNotFound(team.to_string()));
        }
        if task_dir.exists() {
            fs::remove_dir_all(&task_dir)?;
        }
        if team_dir.exists() {
            fs::remove_dir_all(&team_dir)?;
        }
        tracing::debug!(team, "deleted team");
        Ok(())
    }

    /// Locked read-modify-write of the whole roster. `f` returns whether the
    /// config changed; unchanged configs are not rewritten.
    fn modify<F>(&self, team: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut TeamConfig) -> bool,
    {
        let path = self.layout.config_path(team)?;
        if !path.exists() {
            return Err(CrewError::TeamNotFound(team.to_string()));
        }
        lock::with_lock(&path, || {
            let mut config: TeamConfig = read_json(&path)?;
            if f(&mut config) {
                write_json(&path, &config)?;
            }
            Ok(())
        })
    }
}
