use std::fs;

use crate::error::Result;
use crate::model::{AgentRuntimeStatus, RuntimeUpdate, now_ms};
use crate::store::files::{read_json_opt, remove_if_exists, write_json};
use crate::store::lock;
use crate::store::paths::Layout;

/// Heartbeat records under `teams/<team>/runtime/<agent>.json`.
#[derive(Debug, Clone)]
pub struct RuntimeStore {
    layout: Layout,
}

impl RuntimeStore {
    pub fn new(layout: Layout) -> Self {
        Self { layout }
    }

    /// Merge `update` over the stored record (or an empty one). The identity
    /// fields always come from the arguments, never from the file.
    pub fn write_runtime_status(
        &self,
        team: &str,
        agent: &str,
        update: RuntimeUpdate,
    ) -> Result<AgentRuntimeStatus> {
        let path = self.layout.runtime_status_path(team, agent)?;
        fs::create_dir_all(self.layout.runtime_dir(team)?)?;
        lock::with_lock(&path, || {
            let mut status: AgentRuntimeStatus = read_json_opt(&path)?.unwrap_or_default();
            status.apply(update);
            status.team_name = team.to_string();
            status.agent_name = agent.to_string();
            write_json(&path, &status)?;
            Ok(status)
        })
    }

    pub fn read_runtime_status(&self, team: &str, agent: &str) -> Result<Option<AgentRuntimeStatus>> {
        let path = self.layout.runtime_status_path(team, agent)?;
        if !path.exists() {
            return Ok(None);
        }
        lock::with_lock(&path, || read_json_opt(&path))
    }

    pub fn heartbeat(&self, team: &str, agent: &str) -> Result<AgentRuntimeStatus> {
        self.write_runtime_status(
            team,
            agent,
            RuntimeUpdate {
                last_heartbeat_at: Some(now_ms()),
                ..RuntimeUpdate::default()
            },
        )
    }

    /// Record that the agent drained its own inbox, which also proves its
    /// loop is up.
    pub fn record_inbox_read(&self, team: &str, agent: &str) -> Result<AgentRuntimeStatus> {
        let now = now_ms();
        self.write_runtime_status(
            team,
            agent,
            RuntimeUpdate {
                last_heartbeat_at: Some(now),
                last_inbox_read_at: Some(now),
                ready: Some(true),
                ..RuntimeUpdate::default()
            },
        )
    }

    /// Drop the record. Returns false if there was none.
    pub fn remove_runtime_status(&self, team: &str, agent: &str) -> Result<bool> {
        let path = self.layout.runtime_status_path(team, agent)?;
        if !path.exists() {
            return Ok(false);
        }
        lock::with_lock(&path, || remove_if_exists(&path))
    }
}
