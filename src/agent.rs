use crate::hooks::TEAM_ENV;
use crate::store::team::LEAD_NAME;

/// Environment variable naming the acting agent.
pub const AGENT_ENV: &str = "CREW_AGENT";

/// Resolve the acting agent from `CREW_AGENT`.
///
/// Unset or empty means the lead is acting: teammates are always spawned
/// with the variable set.
pub fn resolve_agent() -> String {
    std::env::var(AGENT_ENV)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| LEAD_NAME.to_string())
}

/// Resolve the default team from `CREW_TEAM`. `None` if unset or empty.
pub fn resolve_team() -> Option<String> {
    std::env::var(TEAM_ENV).ok().filter(|s| !s.is_empty())
}

/// Fresh agent id for members created without one.
pub fn generate_agent_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
