use chrono::{Local, NaiveTime};
use tracing::{error, info, warn};

use crate::realtime::{LogEvent, LogLevel};

#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub time: NaiveTime,
    pub message: String,
    pub level: LogLevel,
}

impl LogEntry {
    pub fn line(&self) -> String {
        format!("[{}] {}", self.time.format("%H:%M:%S"), self.message)
    }
}

/// Session log shown in the log panel. Entries are only ever appended; the
/// history fetched from the backend is held separately and replaced on every
/// fetch.
#[derive(Debug, Default)]
pub struct LogPanel {
    entries: Vec<LogEntry>,
    history: Vec<String>,
    visible: bool,
    scroll: usize,
}

impl LogPanel {
    pub fn append(&mut self, message: impl Into<String>, level: LogLevel) {
        self.append_at(Local::now().time(), message.into(), level);
    }

    fn append_at(&mut self, time: NaiveTime, message: String, level: LogLevel) {
        // Mirror into the tracing log so the file log has the same story
        match level {
            LogLevel::Error => error!("{message}"),
            LogLevel::Warning => warn!("{message}"),
            LogLevel::Info | LogLevel::Success => info!("{message}"),
        }
        self.entries.push(LogEntry { time, message, level });
    }

    pub fn push_event(&mut self, event: LogEvent) {
        self.append(event.message, event.level);
    }

    pub fn set_history(&mut self, lines: Vec<String>) {
        self.history = lines;
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.history.clear();
        self.scroll = 0;
        self.append("Logs cleared", LogLevel::Info);
    }

    /// Returns true when the panel just became visible.
    pub fn toggle(&mut self) -> bool {
        self.visible = !self.visible;
        self.visible
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.last()
    }

    /// Lines scrolled up from the bottom.
    pub fn scroll(&self) -> usize {
        self.scroll
    }

    pub fn scroll_up(&mut self, lines: usize) {
        let max = self.entries.len() + self.history.len();
        self.scroll = std::cmp::min(self.scroll + lines, max.saturating_sub(1));
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.scroll = self.scroll.saturating_sub(lines);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_are_stamped_and_kept() {
        let mut panel = LogPanel::default();
        let t = NaiveTime::from_hms_opt(9, 5, 7).unwrap();
        panel.append_at(t, "started".into(), LogLevel::Info);
        for i in 0..1000 {
            panel.push_event(LogEvent::new(format!("event {i}"), LogLevel::Success));
        }
        assert_eq!(panel.entries().len(), 1001);
        assert_eq!(panel.entries()[0].line(), "[09:05:07] started");
        assert_eq!(panel.last().unwrap().message, "event 999");
    }

    #[test]
    fn history_is_replaced_entries_are_not() {
        let mut panel = LogPanel::default();
        panel.append("keep me", LogLevel::Warning);
        panel.set_history(vec!["a".into(), "b".into()]);
        panel.set_history(vec!["c".into()]);
        assert_eq!(panel.history(), &["c".to_string()]);
        assert_eq!(panel.entries().len(), 1);
    }

    #[test]
    fn clear_leaves_a_marker() {
        let mut panel = LogPanel::default();
        panel.append("x", LogLevel::Error);
        panel.set_history(vec!["old".into()]);
        panel.clear();
        assert!(panel.history().is_empty());
        assert_eq!(panel.entries().len(), 1);
        assert_eq!(panel.entries()[0].message, "Logs cleared");
    }

    #[test]
    fn toggle_and_scroll() {
        let mut panel = LogPanel::default();
        assert!(panel.toggle());
        assert!(!panel.toggle());

        for i in 0..3 {
            panel.append(format!("{i}"), LogLevel::Info);
        }
        panel.scroll_up(10);
        assert_eq!(panel.scroll(), 2);
        panel.scroll_down(1);
        assert_eq!(panel.scroll(), 1);
        panel.scroll_down(5);
        assert_eq!(panel.scroll(), 0);
    }
}
