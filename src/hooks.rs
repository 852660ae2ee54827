//! Side effects fired after a task reaches `completed`.
//!
//! Hooks run after the task file has been written. Their failures are logged
//! and never surface as store errors.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::thread;

use crate::model::TaskFile;

/// Environment variable naming the team, set for hook scripts.
pub const TEAM_ENV: &str = "CREW_TEAM";

/// Hook name for task completion; the script is `<hooks_dir>/task_completed.sh`.
pub const TASK_COMPLETED: &str = "task_completed";

pub trait CompletionHook: Send + Sync {
    /// Called once per update that moves a task to `completed`.
    fn task_completed(&self, team: &str, task: &TaskFile);
}

/// Does nothing. Used when no hook is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHook;

impl CompletionHook for NoopHook {
    fn task_completed(&self, _team: &str, _task: &TaskFile) {}
}

/// Runs `<hooks_dir>/<hook>.sh <task-json>`, on a background thread unless
/// built with [`ScriptHook::blocking`].
#[derive(Debug, Clone)]
pub struct ScriptHook {
    hooks_dir: PathBuf,
    detached: bool,
}

impl ScriptHook {
    pub fn new(hooks_dir: impl Into<PathBuf>) -> Self {
        Self {
            hooks_dir: hooks_dir.into(),
            detached: true,
        }
    }

    /// Run hooks on the updating thread. A short-lived process needs this,
    /// or it may exit before a detached hook has run.
    pub fn blocking(mut self) -> Self {
        self.detached = false;
        self
    }

    /// `.crew/hooks` under the current working directory.
    pub fn from_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::new(cwd.join(".crew").join("hooks"))
    }

    pub fn hooks_dir(&self) -> &Path {
        &self.hooks_dir
    }

    pub fn script_path(&self, hook: &str) -> PathBuf {
        self.hooks_dir.join(format!("{hook}.sh"))
    }

    /// Run a hook to completion on the calling thread.
    ///
    /// Returns true when the script is absent or exits 0.
    pub fn run_blocking(&self, hook: &str, team: &str, payload: &serde_json::Value) -> bool {
        let script = self.script_path(hook);
        if !script.exists() {
            return true;
        }
        let arg = payload.to_string();
        match Command::new(&script).arg(arg).env(TEAM_ENV, team).output() {
            Ok(output) if output.status.success() => {
                tracing::debug!(hook, team, "hook succeeded");
                true
            }
            Ok(output) => {
                tracing::warn!(
                    hook,
                    team,
                    status = %output.status,
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "hook failed"
                );
                false
            }
            Err(e) => {
                tracing::warn!(hook, team, error = %e, "hook could not be started");
                false
            }
        }
    }

    /// Run a hook on a detached thread.
    pub fn spawn(&self, hook: &'static str, team: &str, payload: serde_json::Value) -> thread::JoinHandle<bool> {
        let this = self.clone();
        let team = team.to_string();
        thread::spawn(move || this.run_blocking(hook, &team, &payload))
    }
}

impl CompletionHook for ScriptHook {
    fn task_completed(&self, team: &str, task: &TaskFile) {
        match serde_json::to_value(task) {
            Ok(payload) if self.detached => {
                self.spawn(TASK_COMPLETED, team, payload);
            }
            Ok(payload) => {
                self.run_blocking(TASK_COMPLETED, team, &payload);
            }
            Err(e) => tracing::warn!(team, task = %task.id, error = %e, "could not encode hook payload"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn missing_script_counts_as_success() {
        let dir = tempdir().unwrap();
        let hook = ScriptHook::new(dir.path());
        assert!(hook.run_blocking(TASK_COMPLETED, "alpha", &json!({"id": "1"})));
    }

    #[cfg(unix)]
    fn install_script(dir: &Path, body: &str) {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(format!("{TASK_COMPLETED}.sh"));
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn script_receives_payload_and_team() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out.txt");
        install_script(
            dir.path(),
            &format!("printf '%s|%s' \"$CREW_TEAM\" \"$1\" > '{}'", out.display()),
        );

        let hook = ScriptHook::new(dir.path());
        let ok = hook
            .spawn(TASK_COMPLETED, "alpha", json!({"id": "4"}))
            .join()
            .unwrap();
        assert!(ok);
        assert_eq!(
            std::fs::read_to_string(&out).unwrap(),
            r#"alpha|{"id":"4"}"#
        );
    }

    #[cfg(unix)]
    #[test]
    fn nonzero_exit_reports_failure() {
        let dir = tempdir().unwrap();
        install_script(dir.path(), "exit 3");
        let hook = ScriptHook::new(dir.path());
        assert!(!hook.run_blocking(TASK_COMPLETED, "alpha", &json!({})));
    }

    #[cfg(unix)]
    #[test]
    fn blocking_hook_finishes_before_returning() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("done.txt");
        install_script(dir.path(), &format!("echo \"$1\" > '{}'", out.display()));

        let task: TaskFile =
            serde_json::from_value(json!({"id": "7", "subject": "ship", "status": "completed"}))
                .unwrap();
        ScriptHook::new(dir.path()).blocking().task_completed("alpha", &task);

        let written = std::fs::read_to_string(&out).unwrap();
        assert!(written.contains(r#""id":"7""#));
    }
}
