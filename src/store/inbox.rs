use std::fs;
use std::thread;

use chrono::Utc;
use serde::Serialize;

use crate::error::{CrewError, Result};
use crate::model::InboxMessage;
use crate::store::files::{read_json_opt, write_json};
use crate::store::lock;
use crate::store::paths::Layout;
use crate::store::team::TeamStore;

/// Outcome of a broadcast. Partial failure is reported here, not as an error.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct BroadcastReport {
    pub delivered: Vec<String>,
    pub failed: Vec<BroadcastFailure>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BroadcastFailure {
    pub recipient: String,
    pub error: String,
}

/// Per-agent inboxes under `teams/<team>/inboxes/<agent>.json`, each a JSON
/// array in delivery order.
#[derive(Debug, Clone)]
pub struct InboxStore {
    layout: Layout,
}

impl InboxStore {
    pub fn new(layout: Layout) -> Self {
        Self { layout }
    }

    /// Append under the recipient's inbox lock. Delivery order is the order
    /// in which appenders win that lock.
    pub fn append_message(&self, team: &str, agent: &str, message: InboxMessage) -> Result<()> {
        let path = self.layout.inbox_path(team, agent)?;
        fs::create_dir_all(self.layout.inbox_dir(team)?)?;
        lock::with_lock(&path, || {
            let mut messages: Vec<InboxMessage> = read_json_opt(&path)?.unwrap_or_default();
            messages.push(message);
            write_json(&path, &messages)
        })
    }

    pub fn send_plain_message(
        &self,
        team: &str,
        from: &str,
        to: &str,
        text: &str,
        summary: &str,
        color: Option<&str>,
    ) -> Result<InboxMessage> {
        let message = InboxMessage {
            from: from.to_string(),
            text: text.to_string(),
            timestamp: Utc::now(),
            read: false,
            summary: Some(summary.to_string()),
            color: color.map(str::to_string),
        };
        self.append_message(team, to, message.clone())?;
        Ok(message)
    }

    /// Read an inbox, optionally only its unread messages.
    ///
    /// With `mark_as_read`, exactly the returned messages are flagged read;
    /// messages excluded by `unread_only` are left as they are. A missing
    /// inbox reads as empty without taking the lock.
    pub fn read_inbox(
        &self,
        team: &str,
        agent: &str,
        unread_only: bool,
        mark_as_read: bool,
    ) -> Result<Vec<InboxMessage>> {
        let path = self.layout.inbox_path(team, agent)?;
        if !path.exists() {
            return Ok(vec![]);
        }
        lock::with_lock(&path, || {
            let mut messages: Vec<InboxMessage> = read_json_opt(&path)?.unwrap_or_default();
            let selected: Vec<usize> = (0..messages.len())
                .filter(|&i| !unread_only || !messages[i].read)
                .collect();

            if mark_as_read {
                let mut changed = false;
                for &i in &selected {
                    changed |= !messages[i].read;
                    messages[i].read = true;
                }
                if changed {
                    write_json(&path, &messages)?;
                }
            }

            Ok(selected.into_iter().map(|i| messages[i].clone()).collect())
        })
    }

    pub fn unread_count(&self, team: &str, agent: &str) -> Result<usize> {
        Ok(self.read_inbox(team, agent, true, false)?.len())
    }

    /// Send `text` to every member of the team except `from`.
    ///
    /// Deliveries run concurrently and all of them are attempted; failures
    /// are logged and collected in the report. Only a missing or unreadable
    /// roster fails the call.
    pub fn broadcast_message(
        &self,
        team: &str,
        from: &str,
        text: &str,
        summary: &str,
        color: Option<&str>,
    ) -> Result<BroadcastReport> {
        let config = TeamStore::new(self.layout.clone()).read_config(team)?;
        let recipients: Vec<&str> = config
            .members
            .iter()
            .map(|m| m.name.as_str())
            .filter(|name| *name != from)
            .collect();

        let outcomes: Vec<(&str, Result<InboxMessage>)> = thread::scope(|s| {
            let handles: Vec<_> = recipients
                .iter()
                .map(|&to| {
                    let handle =
                        s.spawn(move || self.send_plain_message(team, from, to, text, summary, color));
                    (to, handle)
                })
                .collect();
            handles
                .into_iter()
                .map(|(to, handle)| {
                    let outcome = handle.join().unwrap_or_else(|_| {
                        Err(CrewError::Io(std::io::Error::other("delivery thread panicked")))
                    });
                    (to, outcome)
                })
                .collect()
        });

        let mut report = BroadcastReport::default();
        for (to, outcome) in outcomes {
            match outcome {
                Ok(_) => report.delivered.push(to.to_string()),
                Err(e) => {
                    tracing::warn!(team, from, to, error = %e, "broadcast delivery failed");
                    report.failed.push(BroadcastFailure {
                        recipient: to.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }
}
