//! Terminal rendering of reminder alerts for the command-line host.

use std::io::{self, Write};

use log::{debug, info};

use crate::error::ChannelError;
use crate::notify::{Banner, NotificationBackend, SystemNotification, Tone};

pub struct ConsoleBackend {
    bell: bool,
}

impl ConsoleBackend {
    pub fn new(bell: bool) -> Self {
        Self { bell }
    }
}

pub fn render_banner(banner: &Banner) -> String {
    let mut header = format!("{} {}", banner.emoji, banner.title);
    if banner.sound_enabled {
        header.push_str(" 🔊");
    }
    if banner.alarm_enabled {
        header.push_str(" 📱");
    }

    let mut lines = vec![header];
    if !banner.message.is_empty() {
        lines.push(banner.message.clone());
    }
    lines.push(format!(
        "{}  (dismisses in {}s)",
        banner.time,
        banner.dwell.as_secs()
    ));

    let width = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
    let rule = "─".repeat(width + 2);
    let mut out = format!("┌{rule}┐\n");
    for line in &lines {
        let pad = width - line.chars().count();
        out.push_str(&format!("│ {line}{} │\n", " ".repeat(pad)));
    }
    out.push_str(&format!("└{rule}┘"));
    out
}

impl NotificationBackend for ConsoleBackend {
    fn play_tones(&self, tones: &[Tone]) -> Result<(), ChannelError> {
        if !self.bell {
            return Err(ChannelError::Unsupported);
        }
        debug!("tone pattern: {:?}", tones);
        let mut stdout = io::stdout();
        stdout
            .write_all(b"\x07")
            .and_then(|_| stdout.flush())
            .map_err(|err| ChannelError::Failed(format!("terminal bell: {err}")))
    }

    fn vibrate(&self, _pattern_ms: &[u64]) -> Result<(), ChannelError> {
        Err(ChannelError::Unsupported)
    }

    fn show_system_notification(&self, notification: &SystemNotification) -> Result<(), ChannelError> {
        info!(
            "[{}] {}: {}{}",
            notification.tag,
            notification.title,
            notification.body,
            if notification.require_interaction {
                " (requires dismissal)"
            } else {
                ""
            }
        );
        Ok(())
    }

    fn show_banner(&self, banner: &Banner) -> Result<(), ChannelError> {
        let mut stdout = io::stdout();
        writeln!(stdout, "{}", render_banner(banner))
            .and_then(|_| stdout.flush())
            .map_err(|err| ChannelError::Failed(format!("terminal output: {err}")))
    }
}
