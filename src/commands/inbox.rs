use colored::Colorize;

use crate::error::{CrewError, Result};
use crate::output::{self, Format};
use crate::store::repo::Crew;

pub fn send(
    crew: &Crew,
    team: &str,
    from: &str,
    to: &str,
    text: &str,
    summary: Option<&str>,
    format: Format,
) -> Result<()> {
    if crew.teams.find_member(team, to)?.is_none() {
        return Err(CrewError::MemberNotFound(to.to_string()));
    }
    let summary = summary.map(str::to_string).unwrap_or_else(|| summarize(text));
    let message = crew
        .inbox
        .send_plain_message(team, from, to, text, &summary, None)?;
    match format {
        Format::Json => output::print_json(&message)?,
        Format::Pretty => println!("Sent to '{}': {}", to.cyan(), summary),
    }
    Ok(())
}

pub fn broadcast(
    crew: &Crew,
    team: &str,
    from: &str,
    text: &str,
    summary: Option<&str>,
    format: Format,
) -> Result<()> {
    let summary = summary.map(str::to_string).unwrap_or_else(|| summarize(text));
    let report = crew
        .inbox
        .broadcast_message(team, from, text, &summary, None)?;
    output::print_broadcast(&report, format)
}

/// Read `agent`'s inbox. Draining one's own inbox also marks the reader's
/// loop as ready in its runtime record.
pub fn read(
    crew: &Crew,
    team: &str,
    agent: &str,
    reader: &str,
    all: bool,
    peek: bool,
    format: Format,
) -> Result<()> {
    let messages = crew.inbox.read_inbox(team, agent, !all, !peek)?;
    if !peek && agent == reader {
        crew.runtime.record_inbox_read(team, agent)?;
    }
    output::print_messages(&messages, format)
}

/// Default summary: the first line of the text, shortened.
fn summarize(text: &str) -> String {
    output::truncate(text.lines().next().unwrap_or_default().trim(), 60)
}
