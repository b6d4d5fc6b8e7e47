use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use serde::Serialize;

use crate::error::ChannelError;
use crate::file_logger;
use crate::models::{Reminder, ReminderCategory, TimeOfDay};

const STANDARD_VIBRATION_MS: &[u64] = &[200, 100, 200];
const URGENT_VIBRATION_MS: &[u64] = &[200, 100, 200, 100, 200];
const STANDARD_BANNER_DWELL: Duration = Duration::from_secs(6);
const URGENT_BANNER_DWELL: Duration = Duration::from_secs(10);

/// One beep: pitch, length and start offset from the beginning of the pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Tone {
    pub frequency_hz: u32,
    pub duration_ms: u64,
    pub delay_ms: u64,
}

const fn tone(frequency_hz: u32, duration_ms: u64, delay_ms: u64) -> Tone {
    Tone {
        frequency_hz,
        duration_ms,
        delay_ms,
    }
}

/// Everything about an alert that depends on the reminder category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryProfile {
    pub tones: Vec<Tone>,
    pub vibration_ms: &'static [u64],
    pub banner_dwell: Duration,
    pub requires_interaction: bool,
}

impl CategoryProfile {
    pub fn for_category(category: ReminderCategory) -> Self {
        match category {
            ReminderCategory::Study => Self::standard(vec![
                tone(800, 300, 0),
                tone(600, 300, 100),
                tone(800, 300, 200),
            ]),
            ReminderCategory::Break => Self::standard(vec![tone(400, 500, 0), tone(500, 500, 200)]),
            ReminderCategory::Revision => Self::standard(vec![
                tone(1000, 200, 0),
                tone(800, 200, 100),
                tone(1000, 200, 200),
                tone(800, 200, 300),
            ]),
            ReminderCategory::Exam => Self {
                tones: (0..3u64)
                    .flat_map(|round| [tone(1200, 300, round * 400), tone(900, 300, round * 400 + 150)])
                    .collect(),
                vibration_ms: URGENT_VIBRATION_MS,
                banner_dwell: URGENT_BANNER_DWELL,
                requires_interaction: true,
            },
        }
    }

    fn standard(tones: Vec<Tone>) -> Self {
        Self {
            tones,
            vibration_ms: STANDARD_VIBRATION_MS,
            banner_dwell: STANDARD_BANNER_DWELL,
            requires_interaction: false,
        }
    }
}

/// Neutral chime played when a reminder is created.
pub fn confirmation_tones() -> Vec<Tone> {
    vec![tone(600, 400, 0)]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemNotification {
    pub title: String,
    pub body: String,
    pub tag: String,
    pub require_interaction: bool,
    pub silent: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Banner {
    pub emoji: &'static str,
    pub title: String,
    pub message: String,
    pub time: TimeOfDay,
    pub sound_enabled: bool,
    pub alarm_enabled: bool,
    pub dwell: Duration,
}

/// Local delivery channels. Return `ChannelError::Unsupported` when the
/// device lacks a channel.
pub trait NotificationBackend: Send + Sync {
    fn play_tones(&self, tones: &[Tone]) -> Result<(), ChannelError>;
    fn vibrate(&self, pattern_ms: &[u64]) -> Result<(), ChannelError>;
    fn show_system_notification(&self, notification: &SystemNotification) -> Result<(), ChannelError>;
    fn show_banner(&self, banner: &Banner) -> Result<(), ChannelError>;
}

/// External "schedule a device alarm" collaborator.
pub trait AlarmDelegate: Send + Sync {
    fn schedule_alarm(&self, time: TimeOfDay, title: &str) -> Result<(), ChannelError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Sound,
    Vibration,
    SystemNotification,
    Banner,
    DelegatedAlarm,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelOutcome {
    Delivered,
    /// Turned off for this reminder, or not available on this device.
    Skipped,
    Failed(ChannelError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub reminder_id: String,
    pub outcomes: Vec<(Channel, ChannelOutcome)>,
}

impl DispatchReport {
    pub fn outcome(&self, channel: Channel) -> Option<&ChannelOutcome> {
        self.outcomes
            .iter()
            .find(|(ch, _)| *ch == channel)
            .map(|(_, outcome)| outcome)
    }

    pub fn delivered(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| *outcome == ChannelOutcome::Delivered)
            .count()
    }

    fn record(&mut self, channel: Channel, result: Result<(), ChannelError>) {
        let outcome = match result {
            Ok(()) => ChannelOutcome::Delivered,
            Err(ChannelError::Unsupported) => {
                debug!("reminder {}: {:?} unsupported, skipped", self.reminder_id, channel);
                ChannelOutcome::Skipped
            }
            Err(err) => {
                warn!("reminder {}: {:?} failed: {}", self.reminder_id, channel, err);
                ChannelOutcome::Failed(err)
            }
        };
        self.outcomes.push((channel, outcome));
    }

    fn skip(&mut self, channel: Channel) {
        self.outcomes.push((channel, ChannelOutcome::Skipped));
    }
}

pub struct Dispatcher {
    backend: Arc<dyn NotificationBackend>,
    alarm: Option<Arc<dyn AlarmDelegate>>,
    log_dir: Option<PathBuf>,
}

impl Dispatcher {
    pub fn new(backend: Arc<dyn NotificationBackend>) -> Self {
        Self {
            backend,
            alarm: None,
            log_dir: None,
        }
    }

    pub fn with_alarm(mut self, alarm: Arc<dyn AlarmDelegate>) -> Self {
        self.alarm = Some(alarm);
        self
    }

    /// Append every firing to the JSONL activity log in `dir`.
    pub fn with_log_dir(mut self, dir: PathBuf) -> Self {
        self.log_dir = Some(dir);
        self
    }

    /// Run every channel for a fired reminder. Channels are independent:
    /// a failure is recorded in the report and the next channel still runs.
    pub async fn dispatch(&self, reminder: &Reminder) -> DispatchReport {
        let profile = CategoryProfile::for_category(reminder.category);
        let mut report = DispatchReport {
            reminder_id: reminder.id.clone(),
            outcomes: Vec::with_capacity(5),
        };

        info!(
            "reminder {} '{}' fired ({})",
            reminder.id, reminder.title, reminder.category
        );

        if reminder.sound_enabled {
            report.record(Channel::Sound, self.backend.play_tones(&profile.tones));
        } else {
            report.skip(Channel::Sound);
        }

        report.record(Channel::Vibration, self.backend.vibrate(profile.vibration_ms));

        let notification = SystemNotification {
            title: format!("{} {}", reminder.category.emoji(), reminder.title),
            body: reminder.message.clone(),
            tag: format!("reminder-{}", reminder.id),
            require_interaction: profile.requires_interaction,
            silent: !reminder.sound_enabled,
        };
        report.record(
            Channel::SystemNotification,
            self.backend.show_system_notification(&notification),
        );

        let banner = Banner {
            emoji: reminder.category.emoji(),
            title: reminder.title.clone(),
            message: reminder.message.clone(),
            time: reminder.time_of_day,
            sound_enabled: reminder.sound_enabled,
            alarm_enabled: reminder.delegated_alarm_enabled,
            dwell: profile.banner_dwell,
        };
        report.record(Channel::Banner, self.backend.show_banner(&banner));

        match (&self.alarm, reminder.delegated_alarm_enabled) {
            (Some(alarm), true) => report.record(
                Channel::DelegatedAlarm,
                alarm.schedule_alarm(reminder.time_of_day, &reminder.title),
            ),
            _ => report.skip(Channel::DelegatedAlarm),
        }

        if let Some(dir) = &self.log_dir {
            if let Err(err) = file_logger::append(dir, file_logger::fired_entry(reminder, &report)).await {
                warn!("failed to write activity log: {}", err);
            }
        }

        report
    }

    /// Audible confirmation after a reminder is created.
    pub fn confirm_created(&self, reminder: &Reminder) {
        if let Err(err) = self.backend.play_tones(&confirmation_tones()) {
            debug!("confirmation tone for {} not played: {}", reminder.id, err);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{RecordingAlarm, RecordingBackend};
    use super::*;

    fn reminder(category: ReminderCategory) -> Reminder {
        Reminder {
            id: "1717000000000".to_string(),
            title: "Thermodynamics".to_string(),
            message: "Second law problems".to_string(),
            time_of_day: "17:45".parse().unwrap(),
            category,
            enabled: true,
            recurring: false,
            active_days: Vec::new(),
            sound_enabled: true,
            delegated_alarm_enabled: false,
        }
    }

    #[test]
    fn test_exam_profile_is_urgent() {
        let exam = CategoryProfile::for_category(ReminderCategory::Exam);
        assert_eq!(exam.banner_dwell, Duration::from_secs(10));
        assert!(exam.requires_interaction);
        assert_eq!(exam.vibration_ms, &[200u64, 100, 200, 100, 200]);
        assert_eq!(exam.tones.len(), 6);
        assert_eq!(exam.tones[5], tone(900, 300, 950));

        let pause = CategoryProfile::for_category(ReminderCategory::Break);
        assert_eq!(pause.banner_dwell, Duration::from_secs(6));
        assert!(!pause.requires_interaction);
        assert_eq!(pause.vibration_ms, &[200u64, 100, 200]);
    }

    #[test]
    fn test_categories_have_distinct_tones() {
        let patterns: Vec<Vec<Tone>> = [
            ReminderCategory::Study,
            ReminderCategory::Break,
            ReminderCategory::Revision,
            ReminderCategory::Exam,
        ]
        .into_iter()
        .map(|c| CategoryProfile::for_category(c).tones)
        .collect();
        for (i, a) in patterns.iter().enumerate() {
            for b in &patterns[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[tokio::test]
    async fn test_exam_dispatch_requires_interaction() {
        let backend = Arc::new(RecordingBackend::default());
        let dispatcher = Dispatcher::new(backend.clone());

        let report = dispatcher.dispatch(&reminder(ReminderCategory::Exam)).await;
        assert_eq!(report.delivered(), 4);

        let notification = backend.notifications.lock().unwrap()[0].clone();
        assert_eq!(notification.title, "🎯 Thermodynamics");
        assert_eq!(notification.tag, "reminder-1717000000000");
        assert!(notification.require_interaction);
        assert!(!notification.silent);
        assert_eq!(backend.banners.lock().unwrap()[0].dwell, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_break_dispatch_is_short_and_dismissable() {
        let backend = Arc::new(RecordingBackend::default());
        let dispatcher = Dispatcher::new(backend.clone());

        dispatcher.dispatch(&reminder(ReminderCategory::Break)).await;

        assert!(!backend.notifications.lock().unwrap()[0].require_interaction);
        assert_eq!(backend.banners.lock().unwrap()[0].dwell, Duration::from_secs(6));
    }

    #[tokio::test]
    async fn test_sound_disabled_skips_tones_and_silences_notification() {
        let backend = Arc::new(RecordingBackend::default());
        let dispatcher = Dispatcher::new(backend.clone());
        let mut quiet = reminder(ReminderCategory::Study);
        quiet.sound_enabled = false;

        let report = dispatcher.dispatch(&quiet).await;

        assert_eq!(report.outcome(Channel::Sound), Some(&ChannelOutcome::Skipped));
        assert!(backend.tones.lock().unwrap().is_empty());
        assert!(backend.notifications.lock().unwrap()[0].silent);
    }

    #[tokio::test]
    async fn test_failing_channels_do_not_block_others() {
        let backend = Arc::new(RecordingBackend::default());
        backend.fail(Channel::Sound);
        backend.fail(Channel::SystemNotification);
        let alarm = Arc::new(RecordingAlarm::default());
        let dispatcher = Dispatcher::new(backend.clone()).with_alarm(alarm.clone());
        let mut r = reminder(ReminderCategory::Revision);
        r.delegated_alarm_enabled = true;

        let report = dispatcher.dispatch(&r).await;

        assert!(matches!(report.outcome(Channel::Sound), Some(ChannelOutcome::Failed(_))));
        assert!(matches!(
            report.outcome(Channel::SystemNotification),
            Some(ChannelOutcome::Failed(_))
        ));
        assert_eq!(report.outcome(Channel::Vibration), Some(&ChannelOutcome::Delivered));
        assert_eq!(report.outcome(Channel::Banner), Some(&ChannelOutcome::Delivered));
        assert_eq!(report.outcome(Channel::DelegatedAlarm), Some(&ChannelOutcome::Delivered));
        assert_eq!(backend.banner_titles(), vec!["Thermodynamics".to_string()]);
    }

    #[tokio::test]
    async fn test_delegated_alarm_invoked_once_when_enabled() {
        let backend = Arc::new(RecordingBackend::default());
        let alarm = Arc::new(RecordingAlarm::default());
        let dispatcher = Dispatcher::new(backend).with_alarm(alarm.clone());

        dispatcher.dispatch(&reminder(ReminderCategory::Study)).await;
        assert!(alarm.calls.lock().unwrap().is_empty());

        let mut r = reminder(ReminderCategory::Study);
        r.delegated_alarm_enabled = true;
        dispatcher.dispatch(&r).await;

        let calls = alarm.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0.to_string(), "17:45");
        assert_eq!(calls[0].1, "Thermodynamics");
    }

    #[tokio::test]
    async fn test_confirmation_tone() {
        let backend = Arc::new(RecordingBackend::default());
        let dispatcher = Dispatcher::new(backend.clone());
        dispatcher.confirm_created(&reminder(ReminderCategory::Study));
        assert_eq!(backend.tones.lock().unwrap()[0], confirmation_tones());
    }
}
