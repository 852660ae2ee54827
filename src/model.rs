use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form task metadata. See [`merge_metadata`] for update semantics.
pub type Metadata = Map<String, Value>;

/// Milliseconds since the Unix epoch, the unit of every numeric timestamp on disk.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

// ---------------------------------------------------------------------------
// Team roster
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[clap(rename_all = "snake_case")]
pub enum AgentType {
    Lead,
    #[default]
    Teammate,
}

impl std::fmt::Display for AgentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lead => write!(f, "lead"),
            Self::Teammate => write!(f, "teammate"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub agent_id: String,
    pub name: String,
    pub agent_type: AgentType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub joined_at: i64,
    #[serde(default)]
    pub tmux_pane_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_id: Option<String>,
    #[serde(default)]
    pub cwd: String,
    #[serde(default)]
    pub subscriptions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_mode_required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl Member {
    /// A teammate joining now, with everything optional left unset.
    pub fn teammate(agent_id: impl Into<String>, name: impl Into<String>, cwd: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            name: name.into(),
            agent_type: AgentType::Teammate,
            model: None,
            joined_at: now_ms(),
            tmux_pane_id: String::new(),
            window_id: None,
            cwd: cwd.into(),
            subscriptions: vec![],
            prompt: None,
            color: None,
            thinking: None,
            plan_mode_required: None,
            backend_type: None,
            is_active: None,
        }
    }

    pub fn is_lead(&self) -> bool {
        self.agent_type == AgentType::Lead
    }

    /// Shallow merge: only fields set in `update` are written.
    pub fn apply(&mut self, update: MemberUpdate) {
        if let Some(v) = update.agent_id {
            self.agent_id = v;
        }
        if let Some(v) = update.model {
            self.model = Some(v);
        }
        if let Some(v) = update.tmux_pane_id {
            self.tmux_pane_id = v;
        }
        if let Some(v) = update.window_id {
            self.window_id = Some(v);
        }
        if let Some(v) = update.cwd {
            self.cwd = v;
        }
        if let Some(v) = update.subscriptions {
            self.subscriptions = v;
        }
        if let Some(v) = update.prompt {
            self.prompt = Some(v);
        }
        if let Some(v) = update.color {
            self.color = Some(v);
        }
        if let Some(v) = update.thinking {
            self.thinking = Some(v);
        }
        if let Some(v) = update.plan_mode_required {
            self.plan_mode_required = Some(v);
        }
        if let Some(v) = update.backend_type {
            self.backend_type = Some(v);
        }
        if let Some(v) = update.is_active {
            self.is_active = Some(v);
        }
    }
}

/// Partial member update. The member's `name` is its key and cannot change.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MemberUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tmux_pane_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscriptions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_mode_required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TeamConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub created_at: i64,
    pub lead_agent_id: String,
    pub lead_session_id: String,
    pub members: Vec<Member>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separate_windows: Option<bool>,
}

impl TeamConfig {
    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.name == name)
    }
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[clap(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    Planning,
    InProgress,
    Completed,
    /// Never stored: setting it removes the task file.
    Deleted,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Planning => write!(f, "planning"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Deleted => write!(f, "deleted"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanAction {
    Approve,
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskFile {
    pub id: String,
    pub subject: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_form: Option<String>,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_feedback: Option<String>,
    #[serde(default)]
    pub blocks: Vec<String>,
    #[serde(default)]
    pub blocked_by: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl TaskFile {
    /// Numeric form of the id; ids are decimal strings allocated by the task store.
    pub fn numeric_id(&self) -> u64 {
        self.id.parse().unwrap_or(u64::MAX)
    }

    /// True when a non-blank plan has been submitted.
    pub fn has_plan(&self) -> bool {
        self.plan.as_deref().is_some_and(|p| !p.trim().is_empty())
    }

    /// Shallow merge: only fields set in `update` are written.
    pub fn apply(&mut self, update: TaskUpdate) {
        if let Some(v) = update.subject {
            self.subject = v;
        }
        if let Some(v) = update.description {
            self.description = v;
        }
        if let Some(v) = update.active_form {
            self.active_form = Some(v);
        }
        if let Some(v) = update.status {
            self.status = v;
        }
        if let Some(v) = update.plan {
            self.plan = Some(v);
        }
        if let Some(v) = update.plan_feedback {
            self.plan_feedback = Some(v);
        }
        if let Some(v) = update.blocks {
            self.blocks = v;
        }
        if let Some(v) = update.blocked_by {
            self.blocked_by = v;
        }
        if let Some(v) = update.owner {
            self.owner = Some(v);
        }
        if let Some(v) = update.metadata {
            merge_metadata(&mut self.metadata, v);
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_form: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_feedback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocks: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_by: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl TaskUpdate {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// Shallow-merge `update` into `existing`.
///
/// Keys present in `update` replace stored keys, keys mapped to JSON `null`
/// are removed, and keys absent from `update` are kept. An emptied map is
/// dropped entirely.
pub fn merge_metadata(existing: &mut Option<Metadata>, update: Metadata) {
    let map = existing.get_or_insert_with(Map::new);
    for (key, value) in update {
        if value.is_null() {
            map.remove(&key);
        } else {
            map.insert(key, value);
        }
    }
    if map.is_empty() {
        *existing = None;
    }
}

// ---------------------------------------------------------------------------
// Messaging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InboxMessage {
    pub from: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

// ---------------------------------------------------------------------------
// Runtime status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentRuntimeStatus {
    pub team_name: String,
    pub agent_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_heartbeat_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_inbox_read_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl AgentRuntimeStatus {
    pub fn apply(&mut self, update: RuntimeUpdate) {
        if let Some(v) = update.pid {
            self.pid = Some(v);
        }
        if let Some(v) = update.started_at {
            self.started_at = Some(v);
        }
        if let Some(v) = update.last_heartbeat_at {
            self.last_heartbeat_at = Some(v);
        }
        if let Some(v) = update.last_inbox_read_at {
            self.last_inbox_read_at = Some(v);
        }
        if let Some(v) = update.ready {
            self.ready = Some(v);
        }
        if let Some(v) = update.last_error {
            self.last_error = Some(v);
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_heartbeat_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_inbox_read_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}
