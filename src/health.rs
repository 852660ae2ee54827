//! Teammate liveness, combining the process probe with runtime and inbox state.

use serde::Serialize;

use crate::error::{CrewError, Result};
use crate::model::{AgentRuntimeStatus, Member};
use crate::store::repo::Crew;

/// A heartbeat older than this no longer counts as recent.
pub const HEARTBEAT_STALE_MS: i64 = 90_000;
/// A member that has not become ready this long after joining, while mail
/// waits for it, is considered stalled.
pub const STARTUP_STALL_MS: i64 = 60_000;

/// The slice of the process launcher the core needs: is this member's
/// process (pane, window, pid) still there?
pub trait ProcessProbe {
    fn is_alive(&self, member: &Member) -> bool;
}

impl<F> ProcessProbe for F
where
    F: Fn(&Member) -> bool,
{
    fn is_alive(&self, member: &Member) -> bool {
        self(member)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Health {
    Dead,
    Stalled,
    Starting,
    Healthy,
    Idle,
}

impl std::fmt::Display for Health {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dead => write!(f, "dead"),
            Self::Stalled => write!(f, "stalled"),
            Self::Starting => write!(f, "starting"),
            Self::Healthy => write!(f, "healthy"),
            Self::Idle => write!(f, "idle"),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub alive: bool,
    pub unread_count: usize,
    pub health: Health,
    pub agent_loop_ready: bool,
    pub has_recent_heartbeat: bool,
    pub startup_stalled: bool,
    pub runtime: Option<AgentRuntimeStatus>,
}

/// Pure classification, separated from the stores for testing.
pub fn classify(
    member: &Member,
    alive: bool,
    unread_count: usize,
    runtime: Option<AgentRuntimeStatus>,
    now_ms: i64,
) -> HealthReport {
    let ready = runtime.as_ref().and_then(|r| r.ready).unwrap_or(false);
    let has_recent_heartbeat = runtime
        .as_ref()
        .and_then(|r| r.last_heartbeat_at)
        .is_some_and(|at| now_ms.saturating_sub(at) <= HEARTBEAT_STALE_MS);
    let startup_stalled =
        alive
        && unread_count > 0
        && now_ms.saturating_sub(member.joined_at) > STARTUP_STALL_MS
        && !ready;

    let health = if !alive {
        Health::Dead
    } else if startup_stalled {
        Health::Stalled
    } else if ready && has_recent_heartbeat {
        Health::Healthy
    } else if ready {
        Health::Idle
    } else {
        Health::Starting
    };

    HealthReport {
        alive,
        unread_count,
        health,
        agent_loop_ready: ready,
        has_recent_heartbeat,
        startup_stalled,
        runtime,
    }
}

/// Check one member. Peeks at the inbox without marking anything read.
pub fn check_teammate(
    crew: &Crew,
    team: &str,
    agent: &str,
    probe: &dyn ProcessProbe,
    now_ms: i64,
) -> Result<HealthReport> {
    let member = crew
        .teams
        .find_member(team, agent)?
        .ok_or_else(|| CrewError::MemberNotFound(agent.to_string()))?;
    let alive = probe.is_alive(&member);
    let unread = crew.inbox.unread_count(team, agent)?;
    let runtime = crew.runtime.read_runtime_status(team, agent)?;
    Ok(classify(&member, alive, unread, runtime, now_ms))
}
