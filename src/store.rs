use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDateTime};
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;

use crate::error::{StudyError, StudyResult};
use crate::models::{Day, NewReminder, Reminder, TimeOfDay};

pub const REMINDERS_FILE_NAME: &str = "reminders.json";

/// Persisted reminder collection. Every mutation is written through to disk.
#[derive(Debug, Default)]
pub struct ReminderStore {
    path: Option<PathBuf>,
    reminders: Vec<Reminder>,
}

impl ReminderStore {
    /// Store that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub async fn load(path: impl Into<PathBuf>) -> StudyResult<Self> {
        let path = path.into();

        if !path.exists() {
            info!("no reminder file at {}, starting empty", path.display());
            return Ok(Self {
                path: Some(path),
                reminders: Vec::new(),
            });
        }

        debug!("loading reminders from {}", path.display());
        let parsed: Vec<Reminder> = read_records(&path, "reminders").await?;

        let mut seen = HashSet::new();
        let reminders: Vec<Reminder> = parsed
            .into_iter()
            .filter(|reminder| {
                let fresh = seen.insert(reminder.id.clone());
                if !fresh {
                    warn!("dropping reminder with duplicate id {}", reminder.id);
                }
                fresh
            })
            .collect();

        info!("loaded {} reminder(s)", reminders.len());
        Ok(Self {
            path: Some(path),
            reminders,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn list(&self) -> &[Reminder] {
        &self.reminders
    }

    pub fn get(&self, id: &str) -> Option<&Reminder> {
        self.reminders.iter().find(|r| r.id == id)
    }

    /// Validate a draft, assign it a unique id and persist it.
    pub async fn create(&mut self, draft: NewReminder, now_ms: i64) -> StudyResult<Reminder> {
        let reminder = validate(draft, self.next_id(now_ms))?;
        self.reminders.push(reminder.clone());
        if let Err(err) = self.save().await {
            self.reminders.pop();
            return Err(err);
        }
        info!("created reminder {} '{}'", reminder.id, reminder.title);
        Ok(reminder)
    }

    pub async fn delete(&mut self, id: &str) -> StudyResult<Reminder> {
        let idx = self
            .reminders
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| StudyError::not_found(id))?;
        let removed = self.reminders.remove(idx);
        if let Err(err) = self.save().await {
            self.reminders.insert(idx, removed);
            return Err(err);
        }
        info!("deleted reminder {}", id);
        Ok(removed)
    }

    /// Flip `enabled`, returning the new value.
    pub async fn toggle(&mut self, id: &str) -> StudyResult<bool> {
        let enabled = !self.get(id).ok_or_else(|| StudyError::not_found(id))?.enabled;
        self.set_enabled(id, enabled).await?;
        Ok(enabled)
    }

    pub async fn set_enabled(&mut self, id: &str, enabled: bool) -> StudyResult<()> {
        let reminder = self
            .reminders
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| StudyError::not_found(id))?;
        if reminder.enabled == enabled {
            return Ok(());
        }
        reminder.enabled = enabled;
        if let Err(err) = self.save().await {
            if let Some(reminder) = self.reminders.iter_mut().find(|r| r.id == id) {
                reminder.enabled = !enabled;
            }
            return Err(err);
        }
        info!("reminder {} {}", id, if enabled { "enabled" } else { "disabled" });
        Ok(())
    }

    /// Enabled reminders still due today: recurring ones active on today's
    /// weekday and one-shots whose time has not passed, ordered by time.
    pub fn upcoming_today(&self, now: NaiveDateTime) -> Vec<&Reminder> {
        let today = Day::from_weekday(now.weekday());
        let mut upcoming: Vec<&Reminder> = self
            .reminders
            .iter()
            .filter(|r| r.enabled)
            .filter(|r| {
                if r.recurring {
                    r.active_days.contains(&today)
                } else {
                    now.date().and_time(r.time_of_day.to_naive_time()) > now
                }
            })
            .collect();
        upcoming.sort_by_key(|r| r.time_of_day);
        upcoming
    }

    fn next_id(&self, now_ms: i64) -> String {
        next_id(self.reminders.iter().map(|r| r.id.as_str()), now_ms)
    }

    async fn save(&self) -> StudyResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        write_records(path, &self.reminders, "reminders").await?;
        debug!("saved {} reminder(s) to {}", self.reminders.len(), path.display());
        Ok(())
    }
}

/// Millisecond timestamp id, bumped past the highest numeric id in use.
pub(crate) fn next_id<'a>(ids: impl Iterator<Item = &'a str>, now_ms: i64) -> String {
    let highest = ids.filter_map(|id| id.parse::<i64>().ok()).max();
    let id = match highest {
        Some(max) if max >= now_ms => max + 1,
        _ => now_ms,
    };
    id.to_string()
}

/// Read a JSON array of records. An empty file is an empty list.
pub(crate) async fn read_records<T: DeserializeOwned>(path: &Path, what: &str) -> StudyResult<Vec<T>> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|err| StudyError::storage(format!("failed to read {what}: {err}")))?;

    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&content).map_err(|err| StudyError::storage(format!("invalid {what} JSON: {err}")))
}

/// Write records through a sibling `.tmp` file and rename it into place, so a
/// concurrent reader never sees a half-written file.
pub(crate) async fn write_records<T: Serialize>(path: &Path, records: &[T], what: &str) -> StudyResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|err| StudyError::storage(format!("failed to create data directory: {err}")))?;
    }

    let serialized = serde_json::to_string_pretty(records)
        .map_err(|err| StudyError::storage(format!("failed to serialize {what}: {err}")))?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, serialized)
        .await
        .map_err(|err| StudyError::storage(format!("failed to write {what}: {err}")))?;

    if let Err(err) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(StudyError::storage(format!("failed to replace {what} file: {err}")));
    }
    Ok(())
}

fn validate(draft: NewReminder, id: String) -> StudyResult<Reminder> {
    let title = draft.title.trim().to_string();
    if title.is_empty() {
        return Err(StudyError::invalid("title is required"));
    }
    if draft.time.trim().is_empty() {
        return Err(StudyError::invalid("time is required"));
    }
    let time_of_day: TimeOfDay = draft.time.parse().map_err(StudyError::invalid)?;

    let active_days: Vec<Day> = if draft.recurring {
        let unique: BTreeSet<Day> = draft.days.into_iter().collect();
        if unique.is_empty() {
            return Err(StudyError::invalid("recurring reminder needs at least one day"));
        }
        unique.into_iter().collect()
    } else {
        Vec::new()
    };

    Ok(Reminder {
        id,
        title,
        message: draft.message.trim().to_string(),
        time_of_day,
        category: draft.category,
        enabled: draft.enabled,
        recurring: draft.recurring,
        active_days,
        sound_enabled: draft.sound_enabled,
        delegated_alarm_enabled: draft.delegated_alarm_enabled,
    })
}
