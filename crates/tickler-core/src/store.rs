use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::datetime;
use crate::task::{Task, TaskRecord, normalize_note};

/// Create input. `remind_at` accepts the canonical RFC 3339 form or a
/// local wall-clock form (date-only input yields a date-only reminder).
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub name: String,
    pub remind_at: Option<String>,
    pub note: Option<String>,
}

/// Changed-fields-only edit. The outer `Option` means "leave untouched";
/// the inner one distinguishes setting a value from clearing the field.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub name: Option<String>,
    pub remind_at: Option<Option<String>>,
    pub remind_has_time: Option<bool>,
    pub note: Option<Option<String>>,
}

/// Owner of the canonical task collection.
///
/// Constructed with injected initial state so request scopes and tests
/// control their own lifecycle; grouping and scheduling consume read-only
/// snapshots and hold no reference back.
#[derive(Debug, Default)]
pub struct TaskStore {
    records: Vec<TaskRecord>,
}

impl TaskStore {
    pub fn new(records: Vec<TaskRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Persisted form of the collection.
    pub fn records(&self) -> &[TaskRecord] {
        &self.records
    }

    /// Read-only domain snapshot for the grouping engine and the
    /// reminder scheduler.
    pub fn snapshot(&self) -> Vec<Task> {
        self.records.iter().map(TaskRecord::to_task).collect()
    }

    pub fn get(&self, id: Uuid) -> Option<Task> {
        self.records
            .iter()
            .find(|record| record.id == id)
            .map(TaskRecord::to_task)
    }

    #[tracing::instrument(skip(self, input, now), fields(name = %input.name))]
    pub fn create(&mut self, input: NewTask, now: DateTime<Utc>) -> anyhow::Result<Task> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(anyhow!("task name is required"));
        }

        let (remind_at, remind_has_time) = match input.remind_at.as_deref() {
            Some(raw) => {
                let (ts, flag) = datetime::parse_remind_input(raw)
                    .ok_or_else(|| anyhow!("invalid remind date: {raw}"))?;
                (Some(ts), flag)
            }
            None => (None, None),
        };
        let note = match input.note.as_deref() {
            Some(raw) => normalize_note(raw)?,
            None => None,
        };

        let mut task = Task::new(name.to_string(), now);
        task.remind_at = remind_at;
        task.remind_has_time = remind_has_time;
        task.note = note;

        self.records.push(TaskRecord::from_task(&task));
        info!(id = %task.id, "created task");
        Ok(task)
    }

    #[tracing::instrument(skip(self, patch, now), fields(id = %id))]
    pub fn edit(&mut self, id: Uuid, patch: TaskPatch, now: DateTime<Utc>) -> anyhow::Result<Task> {
        let idx = self
            .records
            .iter()
            .position(|record| record.id == id)
            .ok_or_else(|| anyhow!("no task with id {id}"))?;

        // validate against a copy; the collection only changes on success
        let mut task = self.records[idx].to_task();

        if let Some(raw) = &patch.name {
            let name = raw.trim();
            if name.is_empty() {
                return Err(anyhow!("task name cannot be empty"));
            }
            task.name = name.to_string();
        }

        match &patch.remind_at {
            None => {}
            Some(None) => {
                task.remind_at = None;
                task.remind_has_time = None;
            }
            Some(Some(raw)) => {
                let (ts, flag) = datetime::parse_remind_input(raw)
                    .ok_or_else(|| anyhow!("invalid remind date: {raw}"))?;
                task.remind_at = Some(ts);
                task.remind_has_time = flag;
            }
        }

        if let Some(explicit) = patch.remind_has_time {
            if task.remind_at.is_none() {
                return Err(anyhow!("remind_has_time requires a remind date"));
            }
            task.remind_has_time = Some(explicit);
        }

        match &patch.note {
            None => {}
            Some(None) => task.note = None,
            Some(Some(raw)) => task.note = normalize_note(raw)?,
        }

        task.modified = now;
        let mut record = TaskRecord::from_task(&task);
        if patch.remind_at.is_none() && patch.remind_has_time.is_none() {
            // an untouched reminder keeps its stored raw value, even one
            // that no longer parses
            record.remind_at = self.records[idx].remind_at.clone();
            record.remind_has_time = self.records[idx].remind_has_time;
        }
        self.records[idx] = record;
        info!("edited task");
        Ok(task)
    }

    #[tracing::instrument(skip(self, now), fields(id = %id))]
    pub fn set_completed(
        &mut self,
        id: Uuid,
        completed: bool,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Task> {
        let record = self
            .records
            .iter_mut()
            .find(|record| record.id == id)
            .ok_or_else(|| anyhow!("no task with id {id}"))?;

        record.completed = completed;
        record.modified = now;
        Ok(record.to_task())
    }

    /// Remove a task entirely; no tombstone is kept. Returns whether a
    /// task was removed.
    #[tracing::instrument(skip(self), fields(id = %id))]
    pub fn delete(&mut self, id: Uuid) -> bool {
        let before = self.records.len();
        self.records.retain(|record| record.id != id);
        let deleted = self.records.len() < before;
        if deleted {
            info!("deleted task");
        }
        deleted
    }
}

/// Single-slot JSON cache: one file holding the serialized record array,
/// read once at startup and rewritten on every collection change.
#[derive(Debug)]
pub struct TaskCache {
    pub path: PathBuf,
}

impl TaskCache {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;
        let path = data_dir.join("tasks.json");
        info!(cache = %path.display(), "opened task cache");
        Ok(Self { path })
    }

    /// Load the slot. Missing, unreadable, or corrupt content is an empty
    /// collection, never an error; legacy remind dates are migrated on
    /// the way in.
    #[tracing::instrument(skip(self))]
    pub fn load(&self) -> Vec<TaskRecord> {
        if !self.path.exists() {
            debug!(cache = %self.path.display(), "no saved tasks");
            return vec![];
        }

        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(cache = %self.path.display(), error = %err, "failed reading cache; starting empty");
                return vec![];
            }
        };

        let records: Vec<TaskRecord> = match serde_json::from_str(&raw) {
            Ok(records) => records,
            Err(err) => {
                warn!(cache = %self.path.display(), error = %err, "corrupt cache; starting empty");
                return vec![];
            }
        };

        debug!(count = records.len(), "loaded tasks from cache");
        datetime::migrate_legacy(records)
    }

    /// Rewrite the whole slot atomically.
    #[tracing::instrument(skip(self, records))]
    pub fn save(&self, records: &[TaskRecord]) -> anyhow::Result<()> {
        debug!(cache = %self.path.display(), count = records.len(), "saving cache");

        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp = NamedTempFile::new_in(dir)?;
        let serialized = serde_json::to_string_pretty(records)?;
        temp.write_all(serialized.as_bytes())?;
        temp.flush()?;

        temp.persist(&self.path)
            .map_err(|err| anyhow!("failed to persist {}: {}", self.path.display(), err))?;

        Ok(())
    }
}
