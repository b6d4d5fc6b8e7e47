use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use clap::{Parser, Subcommand};
use log::{error, info, warn};
use tokio::time::{self, Duration};

use study_reminders::config;
use study_reminders::console::ConsoleBackend;
use study_reminders::models::{
    AppConfig, Day, NewReminder, NewStudySlot, Reminder, ReminderCategory, StudySlot, DEFAULT_SLOT_MINUTES,
};
use study_reminders::ReminderService;

const STORE_POLL_SECS: u64 = 30;

#[derive(Parser)]
#[command(name = "study-reminders")]
#[command(about = "Study session reminders with recurring schedules", long_about = None)]
struct Cli {
    /// Settings file (defaults to the platform config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a reminder
    Add {
        title: String,

        /// Time of day, HH:MM (24h)
        #[arg(long)]
        time: String,

        /// study, break, revision or exam
        #[arg(long = "type", default_value = "study")]
        category: ReminderCategory,

        #[arg(long, default_value = "")]
        message: String,

        /// Repeat weekly on --days
        #[arg(long)]
        recurring: bool,

        /// Comma-separated weekdays, e.g. mon,wed,fri
        #[arg(long, value_delimiter = ',')]
        days: Vec<Day>,

        /// Do not play a tone when the reminder fires
        #[arg(long)]
        silent: bool,

        /// Also request a device alarm through the configured webhook
        #[arg(long)]
        phone_alarm: bool,
    },

    /// List all reminders
    List,

    /// Reminders still due today
    Upcoming,

    /// Delete a reminder
    Remove { id: String },

    /// Enable or disable a reminder
    Toggle { id: String },

    /// Manage the weekly study timetable
    Slot {
        #[command(subcommand)]
        action: SlotCommands,
    },

    /// Keep running and fire reminders until interrupted
    Run,
}

#[derive(Subcommand)]
enum SlotCommands {
    /// Add a weekly study session
    Add {
        /// Physics, Chemistry, Biology, Mathematics, ...
        subject: String,

        /// Start time, HH:MM (24h)
        #[arg(long)]
        time: String,

        /// Session length in minutes (15-180)
        #[arg(long, default_value_t = DEFAULT_SLOT_MINUTES)]
        duration: u32,

        /// Comma-separated weekdays, e.g. mon,wed,fri
        #[arg(long, value_delimiter = ',', required = true)]
        days: Vec<Day>,

        /// Keep the session in the timetable without an alarm
        #[arg(long)]
        no_alarm: bool,
    },

    /// List all study sessions
    List,

    /// Today's study sessions
    Today,

    /// Delete a study session
    Remove { id: String },
}

fn describe(reminder: &Reminder) -> String {
    let schedule = if reminder.recurring {
        reminder
            .active_days
            .iter()
            .map(|d| &d.name()[..3])
            .collect::<Vec<_>>()
            .join(",")
    } else {
        "once".to_string()
    };
    format!(
        "{:<14} {} {} {:<24} {:<13} [{}] {}{}",
        reminder.id,
        if reminder.enabled { "●" } else { "○" },
        reminder.time_of_day,
        format!("{} {}", reminder.category.emoji(), reminder.title),
        reminder.category.display_name(),
        schedule,
        if reminder.sound_enabled { "🔊" } else { "" },
        if reminder.delegated_alarm_enabled { "📱" } else { "" },
    )
}

fn describe_slot(slot: &StudySlot) -> String {
    let days = slot
        .days
        .iter()
        .map(|d| &d.name()[..3])
        .collect::<Vec<_>>()
        .join(",");
    format!(
        "{:<14} {} {:<16} {:>3} min [{}] {}",
        slot.id,
        slot.time,
        slot.subject,
        slot.duration,
        days,
        if slot.alarm { "🔔" } else { "" },
    )
}

async fn modified_at(paths: &[PathBuf]) -> Vec<Option<SystemTime>> {
    let mut stamps = Vec::with_capacity(paths.len());
    for path in paths {
        let stamp = match tokio::fs::metadata(path).await {
            Ok(meta) => meta.modified().ok(),
            Err(_) => None,
        };
        stamps.push(stamp);
    }
    stamps
}

async fn run_service(service: &mut ReminderService) {
    let summary = service.start().await;
    println!("{} timer(s) armed", summary.armed);
    for timer in service.scheduled() {
        info!("next: {} at {}", timer.reminder_id, timer.fire_at);
    }

    let watched = service.backing_files();
    let mut last_modified = modified_at(&watched).await;
    let mut poll = time::interval(Duration::from_secs(STORE_POLL_SECS));

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(err) = result {
                    warn!("failed to listen for ctrl-c: {}", err);
                }
                break;
            }
            _ = poll.tick() => {
                let modified = modified_at(&watched).await;
                if modified != last_modified {
                    last_modified = modified;
                    info!("reminder files changed, rebuilding");
                    if let Err(err) = service.reload().await {
                        warn!("reload failed, keeping current timers until the next change: {}", err);
                    }
                }
            }
        }
    }

    service.shutdown().await;
}

async fn run(cli: Cli, cfg: AppConfig) -> Result<(), String> {
    let backend = Arc::new(ConsoleBackend::new(cfg.terminal_bell));
    let mut service = ReminderService::open(&cfg, backend).await?;

    match cli.command {
        Commands::Add {
            title,
            time,
            category,
            message,
            recurring,
            days,
            silent,
            phone_alarm,
        } => {
            let mut draft = NewReminder::new(title, time, category).message(message);
            draft.recurring = recurring;
            draft.days = days;
            draft.sound_enabled = !silent;
            draft.delegated_alarm_enabled = phone_alarm;
            let reminder = service.add(draft).await?;
            println!("added {}", describe(&reminder));
        }
        Commands::List => {
            if service.reminders().is_empty() {
                println!("no reminders");
            }
            for reminder in service.reminders() {
                println!("{}", describe(reminder));
            }
        }
        Commands::Upcoming => {
            let upcoming = service.upcoming_today();
            if upcoming.is_empty() {
                println!("no upcoming reminders for today");
            }
            for reminder in upcoming {
                println!("{}", describe(reminder));
            }
        }
        Commands::Remove { id } => {
            let removed = service.remove(&id).await?;
            println!("removed {}", describe(&removed));
        }
        Commands::Toggle { id } => {
            let enabled = service.toggle(&id).await?;
            println!("{} {}", id, if enabled { "enabled" } else { "disabled" });
        }
        Commands::Slot { action } => match action {
            SlotCommands::Add {
                subject,
                time,
                duration,
                days,
                no_alarm,
            } => {
                let mut draft = NewStudySlot::new(subject, time, days).duration(duration);
                if no_alarm {
                    draft = draft.without_alarm();
                }
                let slot = service.add_slot(draft).await?;
                println!("added {}", describe_slot(&slot));
            }
            SlotCommands::List => {
                if service.slots().is_empty() {
                    println!("timetable is empty");
                }
                for slot in service.slots() {
                    println!("{}", describe_slot(slot));
                }
            }
            SlotCommands::Today => {
                let today = service.today_slots();
                if today.is_empty() {
                    println!("no study sessions scheduled for today");
                }
                for slot in today {
                    println!("{}", describe_slot(slot));
                }
            }
            SlotCommands::Remove { id } => {
                let removed = service.remove_slot(&id).await?;
                println!("removed {}", describe_slot(&removed));
            }
        },
        Commands::Run => run_service(&mut service).await,
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .try_init();

    let cli = Cli::parse();

    let config_path = match cli.config.clone().map(Ok).unwrap_or_else(config::config_path) {
        Ok(path) => path,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    };

    let cfg = match config::load_config(&config_path).await {
        Ok(cfg) => cfg,
        Err(err) => {
            error!("failed to load persisted config, using defaults: {}", err);
            AppConfig::default()
        }
    };

    if let Err(err) = run(cli, cfg).await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
