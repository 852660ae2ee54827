use std::sync::Arc;

use crate::error::{CrewError, Result};
use crate::hooks::{CompletionHook, ScriptHook};
use crate::model::TaskFile;
use crate::store::inbox::InboxStore;
use crate::store::paths::Layout;
use crate::store::runtime::RuntimeStore;
use crate::store::tasks::TaskStore;
use crate::store::team::TeamStore;

/// All stores over one state root.
#[derive(Clone)]
pub struct Crew {
    pub layout: Layout,
    pub teams: TeamStore,
    pub tasks: TaskStore,
    pub inbox: InboxStore,
    pub runtime: RuntimeStore,
}

impl Crew {
    /// Open the stores under `layout`, creating the root directories.
    pub fn open(layout: Layout, hook: Arc<dyn CompletionHook>) -> Result<Self> {
        layout.ensure_dirs()?;
        Ok(Self {
            teams: TeamStore::new(layout.clone()),
            tasks: TaskStore::with_hook(layout.clone(), hook),
            inbox: InboxStore::new(layout.clone()),
            runtime: RuntimeStore::new(layout.clone()),
            layout,
        })
    }

    /// State root from `$CREW_HOME`, completion hooks from `.crew/hooks` in
    /// the working directory, run before the update returns.
    pub fn from_env() -> Result<Self> {
        Self::open(Layout::from_env(), Arc::new(ScriptHook::from_cwd().blocking()))
    }

    /// Store-side half of shutting a teammate down: hand its tasks back,
    /// drop its runtime record and take it off the roster. The lead cannot
    /// be retired. Returns the tasks that were released.
    pub fn retire_member(&self, team: &str, agent: &str) -> Result<Vec<TaskFile>> {
        let member = self
            .teams
            .find_member(team, agent)?
            .ok_or_else(|| CrewError::MemberNotFound(agent.to_string()))?;
        if member.is_lead() {
            return Err(CrewError::InvalidState(format!(
                "{agent} leads team {team} and cannot be retired"
            )));
        }

        let released = self.tasks.reset_owner_tasks(team, agent)?;
        self.runtime.remove_runtime_status(team, agent)?;
        self.teams.remove_member(team, agent)?;
        tracing::debug!(team, agent, released = released.len(), "retired member");
        Ok(released)
    }

    pub fn delete_team(&self, team: &str) -> Result<()> {
        self.teams.delete_team(team)
    }
}
