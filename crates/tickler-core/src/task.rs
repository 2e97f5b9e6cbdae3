use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::datetime;

/// Maximum note length in characters, after trimming.
pub const MAX_NOTE_LEN: usize = 280;

/// In-memory task. `remind_at` is the canonical instant; `None` means the
/// task is a draft with no schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: Uuid,
    pub name: String,
    pub completed: bool,
    pub remind_at: Option<DateTime<Utc>>,
    /// `Some(false)` marks a date-only reminder. Never present without
    /// `remind_at`; when absent, an explicit time is inferred unless the
    /// local wall-clock time is exactly midnight.
    pub remind_has_time: Option<bool>,
    pub note: Option<String>,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl Task {
    pub fn new(name: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            completed: false,
            remind_at: None,
            remind_has_time: None,
            note: None,
            created: now,
            modified: now,
        }
    }
}

/// Persisted form of a task, one element of the cache slot's JSON array.
///
/// `remind_at` stays a raw string here: legacy bare-local values are
/// rewritten by `datetime::migrate_legacy`, and anything that still fails
/// to parse survives load/save untouched instead of being dropped.
/// Field names are camelCase to stay readable with the data the legacy
/// migration targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub id: Uuid,

    pub name: String,

    #[serde(default)]
    pub completed: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remind_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remind_has_time: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,

    #[serde(default = "epoch")]
    pub created: DateTime<Utc>,

    #[serde(default = "epoch")]
    pub modified: DateTime<Utc>,
}

fn epoch() -> DateTime<Utc> {
    DateTime::UNIX_EPOCH
}

impl TaskRecord {
    /// Lenient record-to-domain conversion. An unparseable `remind_at`
    /// degrades to a draft for grouping and scheduling purposes; the
    /// record itself keeps the raw value.
    pub fn to_task(&self) -> Task {
        let remind_at = match self.remind_at.as_deref() {
            Some(raw) => {
                let parsed = datetime::parse_canonical(raw);
                if parsed.is_none() {
                    warn!(id = %self.id, remind_at = raw, "unparseable remind date; treating as draft");
                }
                parsed
            }
            None => None,
        };
        let remind_has_time = if remind_at.is_some() {
            self.remind_has_time
        } else {
            None
        };

        Task {
            id: self.id,
            name: self.name.clone(),
            completed: self.completed,
            remind_at,
            remind_has_time,
            note: self.note.clone(),
            created: self.created,
            modified: self.modified,
        }
    }

    pub fn from_task(task: &Task) -> Self {
        Self {
            id: task.id,
            name: task.name.clone(),
            completed: task.completed,
            remind_at: task.remind_at.map(datetime::format_canonical),
            remind_has_time: task.remind_has_time,
            note: task.note.clone(),
            created: task.created,
            modified: task.modified,
        }
    }
}

/// Trim and bound a note. Empty input normalizes to "no note".
pub fn normalize_note(raw: &str) -> anyhow::Result<Option<String>> {
    let trimmed = raw.trim();
    if trimmed.chars().count() > MAX_NOTE_LEN {
        return Err(anyhow!(
            "note exceeds {MAX_NOTE_LEN} characters"
        ));
    }
    if trimmed.is_empty() {
        Ok(None)
    } else {
        Ok(Some(trimmed.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{MAX_NOTE_LEN, TaskRecord, normalize_note};

    #[test]
    fn note_is_trimmed_and_bounded() {
        assert_eq!(
            normalize_note("  buy stamps  ").expect("valid note"),
            Some("buy stamps".to_string())
        );
        assert_eq!(normalize_note("   ").expect("blank note"), None);

        let long = "x".repeat(MAX_NOTE_LEN);
        assert!(normalize_note(&long).is_ok());
        let too_long = "x".repeat(MAX_NOTE_LEN + 1);
        assert!(normalize_note(&too_long).is_err());
    }

    #[test]
    fn unparseable_remind_date_degrades_to_draft() {
        let record = TaskRecord {
            id: uuid::Uuid::new_v4(),
            name: "garbled".to_string(),
            completed: false,
            remind_at: Some("not-a-date".to_string()),
            remind_has_time: Some(true),
            note: None,
            created: Utc::now(),
            modified: Utc::now(),
        };

        let task = record.to_task();
        assert!(task.remind_at.is_none());
        // the flag must not outlive the schedule it qualifies
        assert!(task.remind_has_time.is_none());
        // but the raw value survives a round-trip of the record itself
        assert_eq!(record.remind_at.as_deref(), Some("not-a-date"));
    }
}
