use crate::error::Result;
use crate::model::{RuntimeUpdate, now_ms};
use crate::output::{self, Format};
use crate::store::repo::Crew;

/// Record a heartbeat, merged with whatever else the agent reports.
pub fn heartbeat(
    crew: &Crew,
    team: &str,
    agent: &str,
    update: RuntimeUpdate,
    format: Format,
) -> Result<()> {
    let update = RuntimeUpdate {
        last_heartbeat_at: Some(now_ms()),
        ..update
    };
    let status = crew.runtime.write_runtime_status(team, agent, update)?;
    output::print_runtime(Some(&status), format)
}

pub fn show(crew: &Crew, team: &str, agent: &str, format: Format) -> Result<()> {
    let status = crew.runtime.read_runtime_status(team, agent)?;
    output::print_runtime(status.as_ref(), format)
}
