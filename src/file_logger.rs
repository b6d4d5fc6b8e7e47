use std::path::Path;

use chrono::{Local, NaiveDate};
use log::info;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::models::Reminder;
use crate::notify::{ChannelOutcome, DispatchReport};

/// Default number of days to keep log files.
pub const DEFAULT_MAX_LOG_DAYS: i64 = 7;

/// A single JSONL log entry written to the daily log file.
#[derive(Debug, Serialize)]
pub struct LogEntry {
    pub ts: String,
    pub reminder_id: String,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Deletes `*.jsonl` files whose date stem is older than `max_days`.
pub async fn cleanup_old_logs(dir: &Path, max_days: i64) {
    let max_days = if max_days <= 0 { DEFAULT_MAX_LOG_DAYS } else { max_days };

    let mut entries = match fs::read_dir(dir).await {
        Ok(e) => e,
        Err(_) => return,
    };

    let cutoff = Local::now().date_naive() - chrono::Duration::days(max_days);

    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if path.extension().map_or(false, |ext| ext == "jsonl") {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if let Ok(file_date) = NaiveDate::parse_from_str(stem, "%Y-%m-%d") {
                    if file_date < cutoff {
                        match fs::remove_file(&path).await {
                            Ok(()) => info!("deleted old log file: {}", path.display()),
                            Err(e) => info!("failed to delete old log {}: {}", path.display(), e),
                        }
                    }
                }
            }
        }
    }
}

/// Appends a `LogEntry` as one JSONL line to `<dir>/YYYY-MM-DD.jsonl`.
pub async fn append(dir: &Path, entry: LogEntry) -> Result<(), String> {
    fs::create_dir_all(dir)
        .await
        .map_err(|e| format!("create log dir: {e}"))?;

    let date = Local::now().format("%Y-%m-%d").to_string();
    let path = dir.join(format!("{date}.jsonl"));

    let mut line =
        serde_json::to_string(&entry).map_err(|e| format!("serialize log entry: {e}"))?;
    line.push('\n');

    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .await
        .map_err(|e| format!("open log file: {e}"))?;

    file.write_all(line.as_bytes())
        .await
        .map_err(|e| format!("write log entry: {e}"))?;

    Ok(())
}

/// Build a LogEntry for a fired reminder and how each channel fared.
pub fn fired_entry(reminder: &Reminder, report: &DispatchReport) -> LogEntry {
    let channels: serde_json::Map<String, Value> = report
        .outcomes
        .iter()
        .map(|(channel, outcome)| {
            let key = serde_json::to_value(channel)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_else(|| format!("{channel:?}"));
            let value = match outcome {
                ChannelOutcome::Delivered => json!("delivered"),
                ChannelOutcome::Skipped => json!("skipped"),
                ChannelOutcome::Failed(err) => json!({ "failed": err.to_string() }),
            };
            (key, value)
        })
        .collect();

    LogEntry {
        ts: Local::now().to_rfc3339(),
        reminder_id: reminder.id.clone(),
        action: "fired".to_string(),
        title: Some(reminder.title.clone()),
        category: Some(reminder.category.to_string()),
        channels: Some(Value::Object(channels)),
        details: Some(json!({ "time": reminder.time_of_day.to_string() })),
    }
}

/// Build a LogEntry for store and scheduler events.
pub fn event_entry(reminder_id: &str, action: &str, details: Option<Value>) -> LogEntry {
    LogEntry {
        ts: Local::now().to_rfc3339(),
        reminder_id: reminder_id.to_string(),
        action: action.to_string(),
        title: None,
        category: None,
        channels: None,
        details,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChannelError;
    use crate::models::ReminderCategory;
    use crate::notify::Channel;
    use std::env;

    fn temp_dir(name: &str) -> std::path::PathBuf {
        let dir = env::temp_dir().join(format!("study_reminders_logs_{name}_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_fired_entry_lists_channels() {
        let reminder = Reminder {
            id: "9".to_string(),
            title: "Optics".to_string(),
            message: String::new(),
            time_of_day: "06:30".parse().unwrap(),
            category: ReminderCategory::Exam,
            enabled: true,
            recurring: false,
            active_days: Vec::new(),
            sound_enabled: true,
            delegated_alarm_enabled: false,
        };
        let report = DispatchReport {
            reminder_id: "9".to_string(),
            outcomes: vec![
                (Channel::Sound, ChannelOutcome::Delivered),
                (Channel::Vibration, ChannelOutcome::Skipped),
                (
                    Channel::SystemNotification,
                    ChannelOutcome::Failed(ChannelError::Failed("blocked".to_string())),
                ),
            ],
        };

        let json = serde_json::to_value(fired_entry(&reminder, &report)).unwrap();
        assert_eq!(json["action"], "fired");
        assert_eq!(json["category"], "exam");
        assert_eq!(json["channels"]["sound"], "delivered");
        assert_eq!(json["channels"]["vibration"], "skipped");
        assert_eq!(json["channels"]["system_notification"]["failed"], "blocked");
    }

    #[tokio::test]
    async fn test_append_writes_jsonl_line() {
        let dir = temp_dir("append");
        append(&dir, event_entry("1", "created", None)).await.unwrap();
        append(&dir, event_entry("1", "deleted", None)).await.unwrap();

        let date = Local::now().format("%Y-%m-%d").to_string();
        let content = std::fs::read_to_string(dir.join(format!("{date}.jsonl"))).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("\"deleted\""));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_cleanup_removes_only_old_logs() {
        let dir = temp_dir("cleanup");
        std::fs::create_dir_all(&dir).unwrap();
        let old = dir.join("2000-01-01.jsonl");
        let today = dir.join(format!("{}.jsonl", Local::now().format("%Y-%m-%d")));
        let other = dir.join("notes.txt");
        for path in [&old, &today, &other] {
            std::fs::write(path, "{}\n").unwrap();
        }

        cleanup_old_logs(&dir, 7).await;

        assert!(!old.exists());
        assert!(today.exists());
        assert!(other.exists());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
