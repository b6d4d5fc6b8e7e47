use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDateTime};
use log::{debug, info, warn};

use crate::error::{StudyError, StudyResult};
use crate::models::{
    Day, NewStudySlot, Reminder, StudySlot, TimeOfDay, MAX_SLOT_MINUTES, MIN_SLOT_MINUTES,
};
use crate::store::{next_id, read_records, write_records};

pub const TIMETABLE_FILE_NAME: &str = "timetable.json";

/// Weekly study timetable, persisted next to the reminders.
#[derive(Debug, Default)]
pub struct TimetableStore {
    path: Option<PathBuf>,
    slots: Vec<StudySlot>,
}

impl TimetableStore {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub async fn load(path: impl Into<PathBuf>) -> StudyResult<Self> {
        let path = path.into();

        if !path.exists() {
            info!("no timetable at {}, starting empty", path.display());
            return Ok(Self {
                path: Some(path),
                slots: Vec::new(),
            });
        }

        debug!("loading timetable from {}", path.display());
        let parsed: Vec<StudySlot> = read_records(&path, "timetable").await?;

        let mut seen = HashSet::new();
        let slots: Vec<StudySlot> = parsed
            .into_iter()
            .filter(|slot| {
                let fresh = seen.insert(slot.id.clone());
                if !fresh {
                    warn!("dropping study slot with duplicate id {}", slot.id);
                }
                fresh
            })
            .collect();

        info!("loaded {} study slot(s)", slots.len());
        Ok(Self {
            path: Some(path),
            slots,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn list(&self) -> &[StudySlot] {
        &self.slots
    }

    pub async fn create(&mut self, draft: NewStudySlot, now_ms: i64) -> StudyResult<StudySlot> {
        let id = next_id(self.slots.iter().map(|s| s.id.as_str()), now_ms);
        let slot = validate(draft, id)?;
        self.slots.push(slot.clone());
        if let Err(err) = self.save().await {
            self.slots.pop();
            return Err(err);
        }
        info!("added study slot {} '{}' at {}", slot.id, slot.subject, slot.time);
        Ok(slot)
    }

    pub async fn delete(&mut self, id: &str) -> StudyResult<StudySlot> {
        let idx = self
            .slots
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| StudyError::not_found(id))?;
        let removed = self.slots.remove(idx);
        if let Err(err) = self.save().await {
            self.slots.insert(idx, removed);
            return Err(err);
        }
        info!("removed study slot {}", id);
        Ok(removed)
    }

    /// Slots held on today's weekday, ordered by start time.
    pub fn today(&self, now: NaiveDateTime) -> Vec<&StudySlot> {
        let today = Day::from_weekday(now.weekday());
        let mut slots: Vec<&StudySlot> = self.slots.iter().filter(|s| s.days.contains(&today)).collect();
        slots.sort_by_key(|s| s.time);
        slots
    }

    /// Weekly alerts for every slot with its alarm switched on.
    pub fn alarm_reminders(&self) -> Vec<Reminder> {
        self.slots
            .iter()
            .filter(|s| s.alarm)
            .map(StudySlot::alarm_reminder)
            .collect()
    }

    async fn save(&self) -> StudyResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        write_records(path, &self.slots, "timetable").await?;
        debug!("saved {} study slot(s) to {}", self.slots.len(), path.display());
        Ok(())
    }
}

fn validate(draft: NewStudySlot, id: String) -> StudyResult<StudySlot> {
    let subject = draft.subject.trim().to_string();
    if subject.is_empty() {
        return Err(StudyError::invalid("subject is required"));
    }
    if draft.time.trim().is_empty() {
        return Err(StudyError::invalid("time is required"));
    }
    let time: TimeOfDay = draft.time.parse().map_err(StudyError::invalid)?;

    if !(MIN_SLOT_MINUTES..=MAX_SLOT_MINUTES).contains(&draft.duration) {
        return Err(StudyError::invalid(format!(
            "duration must be between {MIN_SLOT_MINUTES} and {MAX_SLOT_MINUTES} minutes"
        )));
    }

    let days: BTreeSet<Day> = draft.days.into_iter().collect();
    if days.is_empty() {
        return Err(StudyError::invalid("study slot needs at least one day"));
    }

    Ok(StudySlot {
        id,
        subject,
        time,
        duration: draft.duration,
        days: days.into_iter().collect(),
        alarm: draft.alarm,
    })
}
