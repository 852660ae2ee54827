use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CrewError, Result};

/// Environment variable overriding the state root.
pub const HOME_ENV: &str = "CREW_HOME";

/// Reject anything outside `[A-Za-z0-9_-]+`.
///
/// Every user-supplied path segment passes through here before it is joined
/// onto the state root, so `..`, separators and empty names never reach the
/// filesystem.
pub fn sanitize(name: &str) -> Result<&str> {
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(CrewError::InvalidName(name.to_string()));
    }
    Ok(name)
}

/// On-disk layout under the state root:
///
/// ```text
/// teams/<team>/config.json
/// teams/<team>/inboxes/<agent>.json
/// teams/<team>/runtime/<agent>.json
/// tasks/<team>/<id>.json
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `$CREW_HOME` when set, otherwise `~/.claude`.
    pub fn from_env() -> Self {
        if let Some(root) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
            return Self::new(root);
        }
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(home.join(".claude"))
    }

    /// Create the state root and its `teams/` and `tasks/` subdirectories.
    pub fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(self.teams_root())?;
        fs::create_dir_all(self.tasks_root())?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn teams_root(&self) -> PathBuf {
        self.root.join("teams")
    }

    fn tasks_root(&self) -> PathBuf {
        self.root.join("tasks")
    }

    pub fn team_dir(&self, team: &str) -> Result<PathBuf> {
        Ok(self.teams_root().join(sanitize(team)?))
    }

    pub fn task_dir(&self, team: &str) -> Result<PathBuf> {
        Ok(self.tasks_root().join(sanitize(team)?))
    }

    pub fn config_path(&self, team: &str) -> Result<PathBuf> {
        Ok(self.team_dir(team)?.join("config.json"))
    }

    pub fn task_path(&self, team: &str, task_id: &str) -> Result<PathBuf> {
        Ok(self
            .task_dir(team)?
            .join(format!("{}.json", sanitize(task_id)?)))
    }

    pub fn inbox_dir(&self, team: &str) -> Result<PathBuf> {
        Ok(self.team_dir(team)?.join("inboxes"))
    }

    pub fn inbox_path(&self, team: &str, agent: &str) -> Result<PathBuf> {
        Ok(self
            .inbox_dir(team)?
            .join(format!("{}.json", sanitize(agent)?)))
    }

    pub fn runtime_dir(&self, team: &str) -> Result<PathBuf> {
        Ok(self.team_dir(team)?.join("runtime"))
    }

    pub fn runtime_status_path(&self, team: &str, agent: &str) -> Result<PathBuf> {
        Ok(self
            .runtime_dir(team)?
            .join(format!("{}.json", sanitize(agent)?)))
    }
}
