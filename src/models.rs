use std::fmt;
use std::str::FromStr;

use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

pub const CURRENT_CONFIG_VERSION: u32 = 1;

fn default_true() -> bool {
    true
}

fn default_max_log_days() -> u64 {
    7
}

pub const DEFAULT_SLOT_MINUTES: u32 = 60;
pub const MIN_SLOT_MINUTES: u32 = 15;
pub const MAX_SLOT_MINUTES: u32 = 180;

/// Title of the alert fired for a timetable slot.
pub const STUDY_SLOT_ALERT_TITLE: &str = "NEET Study Time!";

fn default_slot_minutes() -> u32 {
    DEFAULT_SLOT_MINUTES
}

/// Wall-clock hour and minute in local device time, stored as `"HH:MM"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
}

impl TimeOfDay {
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(Self { hour, minute })
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    pub fn to_naive_time(self) -> NaiveTime {
        // hour/minute are range-checked on construction
        NaiveTime::from_hms_opt(self.hour as u32, self.minute as u32, 0).unwrap_or(NaiveTime::MIN)
    }
}

impl FromStr for TimeOfDay {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let (hours, minutes) = trimmed
            .split_once(':')
            .ok_or_else(|| format!("time '{trimmed}' is not in HH:MM format"))?;
        let hour = hours
            .parse::<u8>()
            .map_err(|_| format!("invalid hour in '{trimmed}'"))?;
        let minute = minutes
            .parse::<u8>()
            .map_err(|_| format!("invalid minute in '{trimmed}'"))?;
        if minutes.len() != 2 {
            return Err(format!("invalid minute in '{trimmed}'"));
        }
        TimeOfDay::new(hour, minute).ok_or_else(|| format!("time '{trimmed}' is out of range"))
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Weekday in the Monday-first numbering used by every schedule computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Day {
    #[serde(alias = "Mon")]
    Monday,
    #[serde(alias = "Tue")]
    Tuesday,
    #[serde(alias = "Wed")]
    Wednesday,
    #[serde(alias = "Thu")]
    Thursday,
    #[serde(alias = "Fri")]
    Friday,
    #[serde(alias = "Sat")]
    Saturday,
    #[serde(alias = "Sun")]
    Sunday,
}

impl Day {
    pub const ALL: [Day; 7] = [
        Day::Monday,
        Day::Tuesday,
        Day::Wednesday,
        Day::Thursday,
        Day::Friday,
        Day::Saturday,
        Day::Sunday,
    ];

    /// The single conversion from chrono's weekday into our numbering.
    pub fn from_weekday(weekday: Weekday) -> Self {
        Self::ALL[weekday.num_days_from_monday() as usize]
    }

    /// Monday = 0 … Sunday = 6.
    pub fn index(self) -> u32 {
        self as u32
    }

    pub fn name(self) -> &'static str {
        match self {
            Day::Monday => "Monday",
            Day::Tuesday => "Tuesday",
            Day::Wednesday => "Wednesday",
            Day::Thursday => "Thursday",
            Day::Friday => "Friday",
            Day::Saturday => "Saturday",
            Day::Sunday => "Sunday",
        }
    }
}

impl FromStr for Day {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|day| {
                let name = day.name().to_ascii_lowercase();
                name == wanted || (wanted.len() == 3 && name.starts_with(&wanted))
            })
            .ok_or_else(|| format!("unknown weekday '{}'", value.trim()))
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderCategory {
    Study,
    Break,
    Revision,
    Exam,
}

impl ReminderCategory {
    pub fn display_name(self) -> &'static str {
        match self {
            ReminderCategory::Study => "Study Session",
            ReminderCategory::Break => "Break Time",
            ReminderCategory::Revision => "Revision",
            ReminderCategory::Exam => "Exam Alert",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            ReminderCategory::Study => "📚",
            ReminderCategory::Break => "☕",
            ReminderCategory::Revision => "📝",
            ReminderCategory::Exam => "🎯",
        }
    }
}

impl FromStr for ReminderCategory {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "study" => Ok(ReminderCategory::Study),
            "break" => Ok(ReminderCategory::Break),
            "revision" => Ok(ReminderCategory::Revision),
            "exam" => Ok(ReminderCategory::Exam),
            other => Err(format!("unknown reminder type '{other}'")),
        }
    }
}

impl fmt::Display for ReminderCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReminderCategory::Study => "study",
            ReminderCategory::Break => "break",
            ReminderCategory::Revision => "revision",
            ReminderCategory::Exam => "exam",
        };
        f.write_str(name)
    }
}

/// Persisted reminder record. Field names match the browser export format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(rename = "time")]
    pub time_of_day: TimeOfDay,
    #[serde(rename = "type")]
    pub category: ReminderCategory,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub recurring: bool,
    #[serde(rename = "days", default)]
    pub active_days: Vec<Day>,
    #[serde(default = "default_true")]
    pub sound_enabled: bool,
    #[serde(rename = "phoneAlarm", default)]
    pub delegated_alarm_enabled: bool,
}

/// Creation draft; validated by the store before it becomes a [`Reminder`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReminder {
    pub title: String,
    #[serde(default)]
    pub message: String,
    pub time: String,
    #[serde(rename = "type")]
    pub category: ReminderCategory,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub recurring: bool,
    #[serde(default)]
    pub days: Vec<Day>,
    #[serde(default = "default_true")]
    pub sound_enabled: bool,
    #[serde(rename = "phoneAlarm", default)]
    pub delegated_alarm_enabled: bool,
}

impl NewReminder {
    pub fn new(title: impl Into<String>, time: impl Into<String>, category: ReminderCategory) -> Self {
        Self {
            title: title.into(),
            message: String::new(),
            time: time.into(),
            category,
            enabled: true,
            recurring: false,
            days: Vec::new(),
            sound_enabled: true,
            delegated_alarm_enabled: false,
        }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn recurring_on(mut self, days: impl IntoIterator<Item = Day>) -> Self {
        self.recurring = true;
        self.days = days.into_iter().collect();
        self
    }
}

/// Weekly study session from the timetable. Field names match the browser export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudySlot {
    pub id: String,
    pub subject: String,
    pub time: TimeOfDay,
    #[serde(default = "default_slot_minutes")]
    pub duration: u32,
    pub days: Vec<Day>,
    #[serde(default = "default_true")]
    pub alarm: bool,
}

impl StudySlot {
    /// Timer id of the slot's alarm; kept apart from reminder ids.
    pub fn alarm_id(&self) -> String {
        format!("slot-{}", self.id)
    }

    /// The weekly alert this slot fires, in the form the scheduler arms.
    pub fn alarm_reminder(&self) -> Reminder {
        Reminder {
            id: self.alarm_id(),
            title: STUDY_SLOT_ALERT_TITLE.to_string(),
            message: format!(
                "Time for {} study session ({} minutes)",
                self.subject, self.duration
            ),
            time_of_day: self.time,
            category: ReminderCategory::Study,
            enabled: self.alarm,
            recurring: true,
            active_days: self.days.clone(),
            sound_enabled: true,
            delegated_alarm_enabled: false,
        }
    }
}

/// Creation draft for a [`StudySlot`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewStudySlot {
    pub subject: String,
    pub time: String,
    #[serde(default = "default_slot_minutes")]
    pub duration: u32,
    #[serde(default)]
    pub days: Vec<Day>,
    #[serde(default = "default_true")]
    pub alarm: bool,
}

impl NewStudySlot {
    pub fn new(
        subject: impl Into<String>,
        time: impl Into<String>,
        days: impl IntoIterator<Item = Day>,
    ) -> Self {
        Self {
            subject: subject.into(),
            time: time.into(),
            duration: DEFAULT_SLOT_MINUTES,
            days: days.into_iter().collect(),
            alarm: true,
        }
    }

    pub fn duration(mut self, minutes: u32) -> Self {
        self.duration = minutes;
        self
    }

    pub fn without_alarm(mut self) -> Self {
        self.alarm = false;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding `reminders.json`; platform data dir when unset.
    pub data_directory: Option<String>,
    pub log_directory: Option<String>,
    #[serde(default = "default_max_log_days")]
    pub max_log_days: u64,
    /// Endpoint for delegated device alarms.
    pub alarm_webhook_url: Option<String>,
    pub debug: bool,
    /// Ring the terminal bell when a tone pattern plays.
    #[serde(default = "default_true")]
    pub terminal_bell: bool,
    pub config_version: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_directory: None,
            log_directory: None,
            max_log_days: default_max_log_days(),
            alarm_webhook_url: None,
            debug: false,
            terminal_bell: true,
            config_version: CURRENT_CONFIG_VERSION,
        }
    }
}
