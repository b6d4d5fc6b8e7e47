//! Next-fire-time computation.
//!
//! All arithmetic is naive local wall-clock time: days are added on the
//! calendar, with no timezone or daylight-saving adjustment.

use std::collections::BTreeSet;

use chrono::{Datelike, Duration, NaiveDateTime};

use crate::error::{StudyError, StudyResult};
use crate::models::{Day, Reminder, TimeOfDay};

/// A single pending fire time for a reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Occurrence {
    pub fire_at: NaiveDateTime,
    /// Active day this occurrence belongs to; `None` for one-shot reminders.
    pub day: Option<Day>,
}

/// Today at `time` if that is still ahead of `now`, otherwise tomorrow.
pub fn next_one_shot(now: NaiveDateTime, time: TimeOfDay) -> NaiveDateTime {
    let candidate = now.date().and_time(time.to_naive_time());
    if candidate <= now {
        candidate + Duration::days(1)
    } else {
        candidate
    }
}

/// Nearest `day` at `time` strictly after `now`. A same-day time that has
/// already passed rolls over to next week.
pub fn next_for_day(now: NaiveDateTime, time: TimeOfDay, day: Day) -> NaiveDateTime {
    let today = Day::from_weekday(now.weekday()).index() as i64;
    let offset = (day.index() as i64 - today).rem_euclid(7);
    let candidate = (now.date() + Duration::days(offset)).and_time(time.to_naive_time());

    if offset == 0 && candidate <= now {
        candidate + Duration::days(7)
    } else {
        candidate
    }
}

/// One occurrence per distinct active day, or a single one for one-shot reminders.
pub fn next_occurrences(now: NaiveDateTime, reminder: &Reminder) -> StudyResult<Vec<Occurrence>> {
    if !reminder.recurring {
        return Ok(vec![Occurrence {
            fire_at: next_one_shot(now, reminder.time_of_day),
            day: None,
        }]);
    }

    if reminder.active_days.is_empty() {
        return Err(StudyError::schedule(format!(
            "recurring reminder {} has no active days",
            reminder.id
        )));
    }

    let days: BTreeSet<Day> = reminder.active_days.iter().copied().collect();
    Ok(days
        .into_iter()
        .map(|day| Occurrence {
            fire_at: next_for_day(now, reminder.time_of_day, day),
            day: Some(day),
        })
        .collect())
}

/// Earliest pending occurrence across all active days.
pub fn next_occurrence(now: NaiveDateTime, reminder: &Reminder) -> StudyResult<Occurrence> {
    next_occurrences(now, reminder)?
        .into_iter()
        .min()
        .ok_or_else(|| StudyError::schedule(format!("no occurrence for reminder {}", reminder.id)))
}
