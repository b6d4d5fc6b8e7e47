pub mod alarm_client;
pub mod clock;
pub mod config;
pub mod console;
pub mod error;
pub mod file_logger;
pub mod models;
pub mod notify;
pub mod recurrence;
pub mod scheduler;
pub mod store;
pub mod timetable;

use std::path::PathBuf;
use std::sync::Arc;

use log::{info, warn};
use serde_json::json;

use clock::{Clock, SystemClock};
use error::{StudyError, StudyResult};
use models::{AppConfig, NewReminder, NewStudySlot, Reminder, StudySlot};
use notify::{Dispatcher, NotificationBackend};
use scheduler::{RebuildSummary, ReminderScheduler, ScheduledTimer};
use store::ReminderStore;
use timetable::TimetableStore;

/// Reminder store and study timetable plus the live timers derived from
/// them. Every mutation is saved and followed by a full rebuild.
pub struct ReminderService {
    store: ReminderStore,
    timetable: TimetableStore,
    scheduler: ReminderScheduler,
    dispatcher: Arc<Dispatcher>,
    clock: Arc<dyn Clock>,
    log_dir: Option<PathBuf>,
}

impl ReminderService {
    pub fn new(store: ReminderStore, clock: Arc<dyn Clock>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            scheduler: ReminderScheduler::new(clock.clone(), dispatcher.clone()),
            store,
            timetable: TimetableStore::in_memory(),
            dispatcher,
            clock,
            log_dir: None,
        }
    }

    pub fn with_timetable(mut self, timetable: TimetableStore) -> Self {
        self.timetable = timetable;
        self
    }

    /// Wire stores, dispatcher and delegated alarm from persisted settings.
    pub async fn open(cfg: &AppConfig, backend: Arc<dyn NotificationBackend>) -> StudyResult<Self> {
        let data_dir = config::data_dir(cfg)?;
        let store = ReminderStore::load(data_dir.join(store::REMINDERS_FILE_NAME)).await?;
        let timetable = TimetableStore::load(data_dir.join(timetable::TIMETABLE_FILE_NAME)).await?;
        let log_dir = config::log_dir(cfg)?;

        let mut dispatcher = Dispatcher::new(backend).with_log_dir(log_dir.clone());
        if let Some(url) = &cfg.alarm_webhook_url {
            match alarm_client::WebhookAlarm::new(url.clone(), cfg.debug) {
                Ok(alarm) => dispatcher = dispatcher.with_alarm(Arc::new(alarm)),
                Err(err) => warn!("delegated alarms unavailable: {}", err),
            }
        }

        file_logger::cleanup_old_logs(&log_dir, cfg.max_log_days as i64).await;

        let mut service =
            Self::new(store, Arc::new(SystemClock), Arc::new(dispatcher)).with_timetable(timetable);
        service.log_dir = Some(log_dir);
        Ok(service)
    }

    /// Arm timers for everything in the stores. Call once after loading.
    pub async fn start(&mut self) -> RebuildSummary {
        info!("starting reminder scheduler");
        self.rebuild().await
    }

    /// Re-read both stores from disk and rebuild. If either file cannot be
    /// read the current records and timers are left untouched.
    pub async fn reload(&mut self) -> StudyResult<RebuildSummary> {
        let path = self
            .store
            .path()
            .map(PathBuf::from)
            .ok_or_else(|| StudyError::storage("store has no backing file"))?;
        let store = ReminderStore::load(path).await?;
        let timetable = match self.timetable.path() {
            Some(path) => Some(TimetableStore::load(path.to_path_buf()).await?),
            None => None,
        };

        self.store = store;
        if let Some(timetable) = timetable {
            self.timetable = timetable;
        }
        Ok(self.rebuild().await)
    }

    /// Files the stores persist to, for change detection by the host.
    pub fn backing_files(&self) -> Vec<PathBuf> {
        [self.store.path(), self.timetable.path()]
            .into_iter()
            .flatten()
            .map(PathBuf::from)
            .collect()
    }

    pub async fn add(&mut self, draft: NewReminder) -> StudyResult<Reminder> {
        let now_ms = self.clock.now().and_utc().timestamp_millis();
        let reminder = self.store.create(draft, now_ms).await?;
        self.dispatcher.confirm_created(&reminder);
        self.log_event(&reminder.id, "created", json!({ "title": reminder.title })).await;
        self.rebuild().await;
        Ok(reminder)
    }

    pub async fn remove(&mut self, id: &str) -> StudyResult<Reminder> {
        let removed = self.store.delete(id).await?;
        self.log_event(id, "deleted", json!({ "title": removed.title })).await;
        self.rebuild().await;
        Ok(removed)
    }

    pub async fn toggle(&mut self, id: &str) -> StudyResult<bool> {
        let enabled = self.store.toggle(id).await?;
        self.log_event(id, "toggled", json!({ "enabled": enabled })).await;
        self.rebuild().await;
        Ok(enabled)
    }

    pub async fn add_slot(&mut self, draft: NewStudySlot) -> StudyResult<StudySlot> {
        let now_ms = self.clock.now().and_utc().timestamp_millis();
        let slot = self.timetable.create(draft, now_ms).await?;
        self.log_event(
            &slot.alarm_id(),
            "slot_created",
            json!({ "subject": slot.subject, "time": slot.time, "duration": slot.duration }),
        )
        .await;
        self.rebuild().await;
        Ok(slot)
    }

    pub async fn remove_slot(&mut self, id: &str) -> StudyResult<StudySlot> {
        let removed = self.timetable.delete(id).await?;
        self.log_event(&removed.alarm_id(), "slot_deleted", json!({ "subject": removed.subject }))
            .await;
        self.rebuild().await;
        Ok(removed)
    }

    pub fn slots(&self) -> &[StudySlot] {
        self.timetable.list()
    }

    pub fn today_slots(&self) -> Vec<&StudySlot> {
        self.timetable.today(self.clock.now())
    }

    pub fn reminders(&self) -> &[Reminder] {
        self.store.list()
    }

    pub fn upcoming_today(&self) -> Vec<&Reminder> {
        self.store.upcoming_today(self.clock.now())
    }

    pub fn scheduled(&self) -> Vec<ScheduledTimer> {
        self.scheduler.scheduled()
    }

    pub async fn shutdown(&mut self) {
        let cancelled = self.scheduler.cancel_all().await;
        info!("reminder scheduler stopped ({} pending timer(s) dropped)", cancelled);
    }

    async fn rebuild(&mut self) -> RebuildSummary {
        let mut schedulable = self.store.list().to_vec();
        schedulable.extend(self.timetable.alarm_reminders());
        self.scheduler.rebuild(&schedulable).await
    }

    async fn log_event(&self, id: &str, action: &str, details: serde_json::Value) {
        if let Some(dir) = &self.log_dir {
            if let Err(err) = file_logger::append(dir, file_logger::event_entry(id, action, Some(details))).await {
                warn!("failed to write activity log: {}", err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::models::{Day, ReminderCategory};
    use crate::notify::testing::RecordingBackend;
    use chrono::{NaiveDate, NaiveDateTime};
    use std::time::Duration;

    // 2024-06-03 is a Monday.
    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn service(now: NaiveDateTime) -> (ReminderService, Arc<RecordingBackend>) {
        let backend = Arc::new(RecordingBackend::default());
        let dispatcher = Arc::new(Dispatcher::new(backend.clone()));
        let service = ReminderService::new(
            ReminderStore::in_memory(),
            Arc::new(ManualClock::new(now)),
            dispatcher,
        );
        (service, backend)
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_arms_timer_and_plays_confirmation() {
        let (mut svc, backend) = service(at(3, 6, 0));
        let r = svc
            .add(NewReminder::new("Physics", "07:00", ReminderCategory::Study))
            .await
            .unwrap();

        assert_eq!(backend.tones.lock().unwrap().len(), 1);
        let scheduled = svc.scheduled();
        assert_eq!(scheduled.len(), 1);
        assert_eq!(scheduled[0].reminder_id, r.id);
        assert_eq!(scheduled[0].fire_at, at(3, 7, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_add_changes_nothing() {
        let (mut svc, backend) = service(at(3, 6, 0));
        let draft = NewReminder::new("Mock exam", "09:00", ReminderCategory::Exam).recurring_on([]);

        let err = svc.add(draft).await.unwrap_err();
        assert!(matches!(err, StudyError::InvalidReminder(_)));
        assert!(svc.reminders().is_empty());
        assert!(svc.scheduled().is_empty());
        assert!(backend.tones.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_and_remove_rebuild_timers() {
        let (mut svc, _) = service(at(3, 6, 0));
        let weekly = svc
            .add(
                NewReminder::new("Revision", "07:00", ReminderCategory::Revision)
                    .recurring_on([Day::Monday, Day::Tuesday]),
            )
            .await
            .unwrap();
        let once = svc
            .add(NewReminder::new("Break", "10:00", ReminderCategory::Break))
            .await
            .unwrap();
        assert_eq!(svc.scheduled().len(), 3);

        assert!(!svc.toggle(&weekly.id).await.unwrap());
        assert!(svc.scheduled().iter().all(|t| t.reminder_id == once.id));

        svc.remove(&once.id).await.unwrap();
        assert!(svc.scheduled().is_empty());
        assert_eq!(svc.reminders().len(), 1);

        assert!(svc.toggle(&weekly.id).await.unwrap());
        assert_eq!(svc.scheduled().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_restores_timers_and_fires() {
        let (mut svc, backend) = service(at(3, 6, 0));
        svc.add(NewReminder::new("Chemistry", "06:30", ReminderCategory::Exam))
            .await
            .unwrap();
        svc.shutdown().await;
        assert!(svc.scheduled().is_empty());

        let summary = svc.start().await;
        assert_eq!(summary.armed, 1);

        tokio::time::advance(Duration::from_secs(30 * 60)).await;
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
        let banners = backend.banners.lock().unwrap();
        assert_eq!(banners.len(), 1);
        assert_eq!(banners[0].dwell, Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_study_slot_alarm_fires_with_session_details() {
        let (mut svc, backend) = service(at(3, 6, 0));
        let slot = svc
            .add_slot(NewStudySlot::new("Physics", "07:00", [Day::Monday, Day::Wednesday]).duration(90))
            .await
            .unwrap();
        svc.add_slot(NewStudySlot::new("Chemistry", "06:30", [Day::Monday]).without_alarm())
            .await
            .unwrap();

        let scheduled = svc.scheduled();
        assert_eq!(scheduled.len(), 2);
        assert!(scheduled.iter().all(|t| t.reminder_id == slot.alarm_id()));
        assert_eq!(scheduled[0].fire_at, at(3, 7, 0));
        assert_eq!(scheduled[1].fire_at, at(5, 7, 0));

        let today: Vec<&str> = svc.today_slots().into_iter().map(|s| s.subject.as_str()).collect();
        assert_eq!(today, vec!["Chemistry", "Physics"]);

        tokio::time::advance(Duration::from_secs(60 * 60)).await;
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
        let notifications = backend.notifications.lock().unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].title, "📚 NEET Study Time!");
        assert_eq!(notifications[0].body, "Time for Physics study session (90 minutes)");
    }

    #[tokio::test(start_paused = true)]
    async fn test_removing_slot_cancels_its_alarms() {
        let (mut svc, _) = service(at(3, 6, 0));
        let reminder = svc
            .add(NewReminder::new("Zoology", "08:00", ReminderCategory::Revision))
            .await
            .unwrap();
        let slot = svc
            .add_slot(NewStudySlot::new("Biology", "09:00", Day::ALL))
            .await
            .unwrap();
        assert_eq!(svc.scheduled().len(), 8);

        svc.remove_slot(&slot.id).await.unwrap();
        let scheduled = svc.scheduled();
        assert_eq!(scheduled.len(), 1);
        assert_eq!(scheduled[0].reminder_id, reminder.id);
        assert!(svc.slots().is_empty());
    }

    #[tokio::test]
    async fn test_reload_of_corrupt_file_keeps_timers() {
        let dir = std::env::temp_dir().join(format!("study_reminders_reload_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join(store::REMINDERS_FILE_NAME);

        let backend = Arc::new(RecordingBackend::default());
        let mut svc = ReminderService::new(
            ReminderStore::load(&path).await.unwrap(),
            Arc::new(ManualClock::new(at(3, 6, 0))),
            Arc::new(Dispatcher::new(backend)),
        );
        svc.add(NewReminder::new("Physics", "07:00", ReminderCategory::Study))
            .await
            .unwrap();
        let before = svc.scheduled();
        assert_eq!(before.len(), 1);

        // what a reader could see mid-write from another process
        std::fs::write(&path, "[{\"id\":\"1\",\"ti").unwrap();
        assert!(matches!(svc.reload().await, Err(StudyError::Storage(_))));
        assert_eq!(svc.scheduled(), before);
        assert_eq!(svc.reminders().len(), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_reload_requires_backing_file() {
        let (mut svc, _) = service(at(3, 6, 0));
        assert!(matches!(svc.reload().await, Err(StudyError::Storage(_))));
    }
}
