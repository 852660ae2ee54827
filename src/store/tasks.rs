use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{CrewError, Result};
use crate::hooks::{CompletionHook, NoopHook};
use crate::model::{Metadata, PlanAction, TaskFile, TaskStatus, TaskUpdate};
use crate::store::files::{numeric_json_stems, read_json_opt, remove_if_exists, write_json};
use crate::store::lock::{self, LockOptions};
use crate::store::paths::Layout;
use crate::store::team::TeamStore;

/// Input for [`TaskStore::create_task`].
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub subject: String,
    pub description: String,
    pub active_form: Option<String>,
    pub metadata: Option<Metadata>,
}

impl NewTask {
    pub fn new(subject: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            description: description.into(),
            ..Self::default()
        }
    }
}

/// Per-task JSON files under `tasks/<team>/<id>.json`.
///
/// Single-task operations lock the task file. Operations that depend on the
/// set of files (id allocation, listing, owner reset) lock the task
/// directory itself, i.e. `tasks/<team>.lock`. When both are needed the
/// directory lock is taken first.
#[derive(Clone)]
pub struct TaskStore {
    layout: Layout,
    hook: Arc<dyn CompletionHook>,
    lock_options: LockOptions,
}

impl TaskStore {
    pub fn new(layout: Layout) -> Self {
        Self::with_hook(layout, Arc::new(NoopHook))
    }

    pub fn with_hook(layout: Layout, hook: Arc<dyn CompletionHook>) -> Self {
        Self {
            layout,
            hook,
            lock_options: LockOptions::default(),
        }
    }

    pub fn with_lock_options(mut self, options: LockOptions) -> Self {
        self.lock_options = options;
        self
    }

    fn options(&self, retries: Option<u32>) -> LockOptions {
        match retries {
            Some(max_retries) => LockOptions {
                max_retries,
                ..self.lock_options
            },
            None => self.lock_options,
        }
    }

    pub fn create_task(&self, team: &str, new: NewTask) -> Result<TaskFile> {
        if new.subject.trim().is_empty() {
            return Err(CrewError::EmptySubject);
        }
        if !TeamStore::new(self.layout.clone()).team_exists(team)? {
            return Err(CrewError::TeamNotFound(team.to_string()));
        }

        let dir = self.layout.task_dir(team)?;
        fs::create_dir_all(&dir)?;

        // Id allocation and the write must be one critical section, or two
        // creators can pick the same id.
        lock::with_lock_options(&dir, &self.lock_options, || {
            let id = next_id(&dir)?.to_string();
            let task = TaskFile {
                id: id.clone(),
                subject: new.subject,
                description: new.description,
                active_form: new.active_form,
                status: TaskStatus::Pending,
                plan: None,
                plan_feedback: None,
                blocks: vec![],
                blocked_by: vec![],
                owner: None,
                metadata: new.metadata,
            };
            write_json(&self.layout.task_path(team, &id)?, &task)?;
            tracing::debug!(team, task = %id, "created task");
            Ok(task)
        })
    }

    pub fn read_task(&self, team: &str, task_id: &str, retries: Option<u32>) -> Result<TaskFile> {
        let path = self.existing_task_path(team, task_id)?;
        lock::with_lock_options(&path, &self.options(retries), || {
            read_json_opt(&path)?.ok_or_else(|| CrewError::TaskNotFound(task_id.to_string()))
        })
    }

    /// Merge `update` into the stored task.
    ///
    /// Setting `deleted` removes the file and returns the merged record.
    /// Setting `completed` fires the completion hook once the write is done.
    pub fn update_task(
        &self,
        team: &str,
        task_id: &str,
        update: TaskUpdate,
        retries: Option<u32>,
    ) -> Result<TaskFile> {
        let path = self.existing_task_path(team, task_id)?;
        let completing = update.status == Some(TaskStatus::Completed);

        let task = lock::with_lock_options(&path, &self.options(retries), || {
            let mut task: TaskFile = read_json_opt(&path)?
                .ok_or_else(|| CrewError::TaskNotFound(task_id.to_string()))?;
            task.apply(update);
            if task.status == TaskStatus::Deleted {
                remove_if_exists(&path)?;
                tracing::debug!(team, task = %task_id, "deleted task");
            } else {
                write_json(&path, &task)?;
            }
            Ok(task)
        })?;

        if completing && task.status == TaskStatus::Completed {
            self.hook.task_completed(team, &task);
        }
        Ok(task)
    }

    pub fn submit_plan(&self, team: &str, task_id: &str, plan: &str) -> Result<TaskFile> {
        if plan.trim().is_empty() {
            return Err(CrewError::EmptyPlan);
        }
        self.update_task(
            team,
            task_id,
            TaskUpdate {
                status: Some(TaskStatus::Planning),
                plan: Some(plan.to_string()),
                ..TaskUpdate::default()
            },
            None,
        )
    }

    /// Approve or reject a submitted plan.
    ///
    /// Checked in order under the task lock: the task must be `planning`,
    /// must carry a plan, and a rejection must carry feedback. The decision
    /// is made against the state the write replaces.
    pub fn evaluate_plan(
        &self,
        team: &str,
        task_id: &str,
        action: PlanAction,
        feedback: Option<&str>,
        retries: Option<u32>,
    ) -> Result<TaskFile> {
        let path = self.existing_task_path(team, task_id)?;
        lock::with_lock_options(&path, &self.options(retries), || {
            let mut task: TaskFile = read_json_opt(&path)?
                .ok_or_else(|| CrewError::TaskNotFound(task_id.to_string()))?;

            if task.status != TaskStatus::Planning {
                return Err(CrewError::InvalidState(format!(
                    "task {task_id} is {}, plans can only be evaluated while planning",
                    task.status
                )));
            }
            if !task.has_plan() {
                return Err(CrewError::NoPlanSubmitted(task_id.to_string()));
            }

            match action {
                PlanAction::Approve => {
                    task.status = TaskStatus::InProgress;
                    task.plan_feedback = Some(String::new());
                }
                PlanAction::Reject => {
                    let feedback = feedback
                        .filter(|f| !f.trim().is_empty())
                        .ok_or(CrewError::FeedbackRequired)?;
                    task.plan_feedback = Some(feedback.to_string());
                }
            }

            write_json(&path, &task)?;
            Ok(task)
        })
    }

    /// All tasks, ascending by numeric id. A team without a task directory
    /// has no tasks.
    pub fn list_tasks(&self, team: &str) -> Result<Vec<TaskFile>> {
        let dir = self.layout.task_dir(team)?;
        if !dir.exists() {
            return Ok(vec![]);
        }
        lock::with_lock_options(&dir, &self.lock_options, || {
            let mut ids = numeric_json_stems(&dir)?;
            ids.sort_unstable();
            let mut tasks = Vec::with_capacity(ids.len());
            for id in ids {
                // Deletion only holds the file lock, so a file may vanish mid-scan.
                if let Some(task) = read_json_opt::<TaskFile>(&dir.join(format!("{id}.json")))? {
                    tasks.push(task);
                }
            }
            Ok(tasks)
        })
    }

    /// Release every task owned by `agent`: clear the owner and put
    /// unfinished work back to `pending`. Completed tasks keep their status.
    /// Returns the tasks that changed.
    pub fn reset_owner_tasks(&self, team: &str, agent: &str) -> Result<Vec<TaskFile>> {
        let dir = self.layout.task_dir(team)?;
        if !dir.exists() {
            return Ok(vec![]);
        }
        lock::with_lock_options(&dir, &self.lock_options, || {
            let mut ids = numeric_json_stems(&dir)?;
            ids.sort_unstable();
            let mut released = Vec::new();
            for id in ids {
                let path = dir.join(format!("{id}.json"));
                let changed = lock::with_lock_options(&path, &self.lock_options, || {
                    let Some(mut task) = read_json_opt::<TaskFile>(&path)? else {
                        return Ok(None);
                    };
                    if task.owner.as_deref() != Some(agent) {
                        return Ok(None);
                    }
                    task.owner = None;
                    if task.status != TaskStatus::Completed {
                        task.status = TaskStatus::Pending;
                    }
                    write_json(&path, &task)?;
                    Ok(Some(task))
                })?;
                released.extend(changed);
            }
            if !released.is_empty() {
                tracing::debug!(team, agent, count = released.len(), "released owned tasks");
            }
            Ok(released)
        })
    }

    fn existing_task_path(&self, team: &str, task_id: &str) -> Result<PathBuf> {
        let path = self.layout.task_path(team, task_id)?;
        if !path.exists() {
            return Err(CrewError::TaskNotFound(task_id.to_string()));
        }
        Ok(path)
    }
}

/// Max existing numeric id + 1, or 1 for an empty directory.
fn next_id(dir: &Path) -> Result<u64> {
    Ok(numeric_json_stems(dir)?.into_iter().max().map_or(1, |max| max + 1))
}
