use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDateTime;
use log::{debug, error, info};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant};

use crate::clock::Clock;
use crate::models::{Day, Reminder};
use crate::notify::Dispatcher;
use crate::recurrence;

/// A pending fire time as seen from outside the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledTimer {
    pub reminder_id: String,
    pub fire_at: NaiveDateTime,
    pub day: Option<Day>,
}

/// Cancellation token and task handle for one armed timer.
struct TimerControl {
    timer: ScheduledTimer,
    cancel_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl TimerControl {
    fn is_live(&self) -> bool {
        !self.handle.is_finished()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebuildSummary {
    pub cancelled: usize,
    pub armed: usize,
    /// Reminders left unscheduled because their occurrence could not be computed.
    pub skipped: Vec<String>,
}

/// Owns every live reminder timer, keyed by reminder id.
pub struct ReminderScheduler {
    timers: HashMap<String, Vec<TimerControl>>,
    clock: Arc<dyn Clock>,
    dispatcher: Arc<Dispatcher>,
}

impl ReminderScheduler {
    pub fn new(clock: Arc<dyn Clock>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            timers: HashMap::new(),
            clock,
            dispatcher,
        }
    }

    /// Cancel every outstanding timer, then arm one per pending occurrence of
    /// each enabled reminder. Old timers are fully stopped before any new
    /// timer is armed.
    pub async fn rebuild(&mut self, reminders: &[Reminder]) -> RebuildSummary {
        let cancelled = self.cancel_all().await;
        let now = self.clock.now();
        let mut summary = RebuildSummary {
            cancelled,
            ..Default::default()
        };

        for reminder in reminders {
            if !reminder.enabled {
                continue;
            }

            let occurrences = match recurrence::next_occurrences(now, reminder) {
                Ok(occurrences) => occurrences,
                Err(err) => {
                    error!("skipping reminder {}: {}", reminder.id, err);
                    summary.skipped.push(reminder.id.clone());
                    continue;
                }
            };

            let reminder = Arc::new(reminder.clone());
            let controls: Vec<TimerControl> = occurrences
                .into_iter()
                .map(|occurrence| {
                    let delay = (occurrence.fire_at - now).to_std().unwrap_or(Duration::ZERO);
                    let deadline = Instant::now() + delay;
                    let (cancel_tx, cancel_rx) = watch::channel(false);
                    let handle = tokio::spawn(Self::timer_task(
                        reminder.clone(),
                        deadline,
                        self.dispatcher.clone(),
                        cancel_rx,
                    ));
                    debug!(
                        "reminder {} armed for {} (in {}s)",
                        reminder.id,
                        occurrence.fire_at,
                        delay.as_secs()
                    );
                    TimerControl {
                        timer: ScheduledTimer {
                            reminder_id: reminder.id.clone(),
                            fire_at: occurrence.fire_at,
                            day: occurrence.day,
                        },
                        cancel_tx,
                        handle,
                    }
                })
                .collect();

            summary.armed += controls.len();
            self.timers.insert(reminder.id.clone(), controls);
        }

        info!(
            "scheduler rebuilt: {} timer(s) armed, {} cancelled, {} skipped",
            summary.armed,
            summary.cancelled,
            summary.skipped.len()
        );
        summary
    }

    /// Signal every timer to stop and wait for the tasks to exit. Returns how
    /// many were still pending.
    pub async fn cancel_all(&mut self) -> usize {
        if self.timers.is_empty() {
            return 0;
        }

        let timers = std::mem::take(&mut self.timers);
        let mut cancelled = 0;
        for control in timers.into_values().flatten() {
            if control.is_live() {
                cancelled += 1;
            }
            let _ = control.cancel_tx.send(true);
            let _ = control.handle.await;
        }

        debug!("cancelled {} pending timer(s)", cancelled);
        cancelled
    }

    /// Pending timers ordered by deadline.
    pub fn scheduled(&self) -> Vec<ScheduledTimer> {
        let mut timers: Vec<ScheduledTimer> = self
            .timers
            .values()
            .flatten()
            .filter(|control| control.is_live())
            .map(|control| control.timer.clone())
            .collect();
        timers.sort_by(|a, b| {
            a.fire_at
                .cmp(&b.fire_at)
                .then_with(|| a.reminder_id.cmp(&b.reminder_id))
        });
        timers
    }

    pub fn timers_for(&self, reminder_id: &str) -> Vec<ScheduledTimer> {
        self.timers
            .get(reminder_id)
            .map(|controls| {
                controls
                    .iter()
                    .filter(|control| control.is_live())
                    .map(|control| control.timer.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn live_timer_count(&self) -> usize {
        self.timers
            .values()
            .flatten()
            .filter(|control| control.is_live())
            .count()
    }

    /// Sleeps until the deadline and dispatches once. Fired timers are not
    /// re-armed; the next rebuild schedules the following occurrence.
    async fn timer_task(
        reminder: Arc<Reminder>,
        deadline: Instant,
        dispatcher: Arc<Dispatcher>,
        mut cancel_rx: watch::Receiver<bool>,
    ) {
        tokio::select! {
            _ = cancel_rx.changed() => {
                debug!("reminder {} timer cancelled", reminder.id);
            }
            _ = time::sleep_until(deadline) => {
                dispatcher.dispatch(&reminder).await;
            }
        }
    }
}
