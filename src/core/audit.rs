//! Audit trail for snooze, alarm and escalation events.
//!
//! Stored as JSON lines so the file can be appended to without rewriting it.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::model::AlertKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    Snoozed {
        at: NaiveDateTime,
        minutes: u32,
        until: NaiveDateTime,
    },
    SnoozeCancelled {
        at: NaiveDateTime,
        /// Minutes the snooze actually lasted
        elapsed_minutes: u32,
    },
    SnoozeExpired {
        at: NaiveDateTime,
    },
    AlarmStarted {
        at: NaiveDateTime,
        kind: AlertKind,
        value_mmol: f64,
        urgent: bool,
    },
    AlarmCleared {
        at: NaiveDateTime,
    },
    EscalationSent {
        at: NaiveDateTime,
        contact: String,
        kind: AlertKind,
    },
    EscalationFailed {
        at: NaiveDateTime,
        contact: String,
        kind: AlertKind,
        error: String,
    },
}

/// Receives audit events. Implementations must not fail the caller.
pub trait AuditSink: Send {
    fn record(&mut self, event: &AuditEvent);
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn record(&mut self, _event: &AuditEvent) {}
}

/// Appends events to a `.jsonl` file.
pub struct JsonlAuditLog {
    path: PathBuf,
}

impl JsonlAuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, event: &AuditEvent) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut line = serde_json::to_string(event)?;
        line.push('\n');
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(line.as_bytes())
    }

    /// Read back every event in the log. Malformed lines are skipped.
    pub fn read_all(&self) -> io::Result<Vec<AuditEvent>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }
}

impl AuditSink for JsonlAuditLog {
    fn record(&mut self, event: &AuditEvent) {
        if let Err(e) = self.append(event) {
            log::error!("Failed to write audit event to {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 2, 2)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_append_and_read_back() {
        let dir = tempdir().unwrap();
        let mut audit = JsonlAuditLog::new(dir.path().join("nested").join("audit.jsonl"));

        audit.record(&AuditEvent::AlarmStarted {
            at: noon(),
            kind: AlertKind::Low,
            value_mmol: 3.1,
            urgent: false,
        });
        audit.record(&AuditEvent::AlarmCleared { at: noon() });

        let events = audit.read_all().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], AuditEvent::AlarmCleared { at: noon() });

        let raw = fs::read_to_string(audit.path()).unwrap();
        assert!(raw.lines().next().unwrap().contains(r#""event":"alarm_started""#));
    }

    #[test]
    fn test_write_failure_does_not_panic() {
        let dir = tempdir().unwrap();
        // The log path is an existing directory, so opening it for append fails
        let mut audit = JsonlAuditLog::new(dir.path());
        audit.record(&AuditEvent::SnoozeExpired { at: noon() });
    }
}
