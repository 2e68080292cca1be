use std::time::Instant;

use arboard::Clipboard;
use chrono::{DateTime, Local, TimeDelta};
use ratatui::crossterm::event::KeyEvent;
use tracing::{debug, info, trace};

use crate::domain::{DashError, DashboardConfig, Message};
use crate::engine::{SortDirection, SortKey, TableViewEngine};
use crate::inputter::{InputResult, Inputter};
use crate::logpanel::LogPanel;
use crate::poller::{Cadence, Fetcher, Response};
use crate::realtime::{LogLevel, RealtimeChannel};
use crate::record::{LinkRecord, LinkStatus};
use crate::snapshot::{HealthBreakdown, StatusSnapshot, Summary, status_histogram};
use crate::source::DataSource;

#[derive(Debug, PartialEq)]
pub enum Status {
    Ready,
    Quitting,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Modus {
    Table,
    Search,
    Help,
}

pub struct Model {
    pub status: Status,
    modus: Modus,
    engine: TableViewEngine,
    summary: Summary,
    breakdown: HealthBreakdown,
    histogram: Vec<(LinkStatus, usize)>,
    logs: LogPanel,
    fetcher: Fetcher,
    realtime: RealtimeChannel,
    refresh: Cadence,
    log_refresh: Cadence,
    pending_status: Option<u64>,
    applied_seq: u64,
    selected_row: usize,
    input: Inputter,
    last_input: InputResult,
    clipboard: Option<Clipboard>,
    last_update: Option<DateTime<Local>>,
    status_message: String,
    last_status_message_update: Instant,
}

impl Model {
    pub fn init(config: &DashboardConfig, source: Box<dyn DataSource>, realtime: RealtimeChannel) -> Self {
        let mut model = Self {
            status: Status::Ready,
            modus: Modus::Table,
            engine: TableViewEngine::new(),
            summary: Summary::default(),
            breakdown: HealthBreakdown::default(),
            histogram: Vec::new(),
            logs: LogPanel::default(),
            fetcher: Fetcher::spawn(source, config.export_dir.clone()),
            realtime,
            refresh: Cadence::new(config.refresh_interval),
            log_refresh: Cadence::new(config.log_refresh_interval),
            pending_status: None,
            applied_seq: 0,
            selected_row: 0,
            input: Inputter::default(),
            last_input: InputResult::default(),
            clipboard: None,
            last_update: None,
            status_message: String::new(),
            last_status_message_update: Instant::now(),
        };
        model.logs.append("Monitoring dashboard started", LogLevel::Info);
        if !model.realtime.enabled() {
            model.logs.append("No websocket url configured, realtime logs disabled", LogLevel::Warning);
        }
        model.set_status_message("Loading ...");
        model
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), DashError> {
        self.poll_background(Instant::now());

        if let Some(msg) = message {
            match self.modus {
                Modus::Table => match msg {
                    Message::Quit => self.quit(),
                    Message::Refresh => {
                        self.logs.append("Manual refresh requested", LogLevel::Info);
                        self.request_refresh(Instant::now());
                    }
                    Message::Search => self.enter_search(),
                    Message::SortBy(key) => self.sort(key),
                    Message::NextPage => self.change_page(TableViewEngine::next_page),
                    Message::PrevPage => self.change_page(TableViewEngine::prev_page),
                    Message::FirstPage => self.change_page(TableViewEngine::first_page),
                    Message::LastPage => self.change_page(TableViewEngine::last_page),
                    Message::MoveUp => self.selected_row = self.selected_row.saturating_sub(1),
                    Message::MoveDown => {
                        let rows = self.engine.page_slice().records.len();
                        self.selected_row = std::cmp::min(self.selected_row + 1, rows.saturating_sub(1));
                    }
                    Message::CopyUrl => self.copy_selected_url(),
                    Message::ToggleLogs => self.toggle_logs(),
                    Message::ClearLogs => self.logs.clear(),
                    Message::ScrollLogsUp => self.logs.scroll_up(5),
                    Message::ScrollLogsDown => self.logs.scroll_down(5),
                    Message::Export => self.export(),
                    Message::Help => self.modus = Modus::Help,
                    Message::Exit => {
                        if !self.engine.filter_term().is_empty() {
                            self.apply_filter("");
                        }
                    }
                    Message::RawKey(_) => (),
                },
                Modus::Search => {
                    if let Message::RawKey(key) = msg {
                        self.raw_input(key)
                    }
                }
                Modus::Help => match msg {
                    Message::Quit => self.quit(),
                    Message::Help | Message::Exit => self.modus = Modus::Table,
                    _ => (),
                },
            }
        }
        Ok(())
    }

    pub fn quit(&mut self) {
        self.status = Status::Quitting;
    }

    pub fn raw_keyevents(&self) -> bool {
        self.modus == Modus::Search
    }

    // -------------------- Background work ---------------------- //

    fn poll_background(&mut self, now: Instant) {
        for response in self.fetcher.drain() {
            self.handle_response(response);
        }
        for event in self.realtime.drain() {
            self.logs.push_event(event);
        }

        if self.refresh.due(now) && self.pending_status.is_none() {
            self.request_refresh(now);
        }
        if self.logs.visible() && self.log_refresh.due(now) {
            self.request_logs(now);
        }
    }

    fn request_refresh(&mut self, now: Instant) {
        self.refresh.mark(now);
        match self.fetcher.request_status() {
            Ok(seq) => {
                debug!("Requested status snapshot #{seq}");
                self.pending_status = Some(seq);
            }
            Err(e) => self.logs.append(format!("Failed to refresh data: {e}"), LogLevel::Error),
        }
    }

    fn request_logs(&mut self, now: Instant) {
        self.log_refresh.mark(now);
        if let Err(e) = self.fetcher.request_logs() {
            self.logs.append(format!("Failed to load logs: {e}"), LogLevel::Error);
        }
    }

    fn handle_response(&mut self, response: Response) {
        match response {
            Response::Status { seq, result } => {
                if self.pending_status.is_some_and(|p| p <= seq) {
                    self.pending_status = None;
                }
                match result {
                    Ok(_) if seq <= self.applied_seq => {
                        debug!("Discarding stale snapshot #{seq}, #{} is already shown", self.applied_seq);
                    }
                    Ok(snapshot) => {
                        self.applied_seq = seq;
                        self.apply_snapshot(snapshot);
                    }
                    Err(e) => {
                        debug!("Snapshot #{seq} failed ({:?})", e.kind());
                        self.logs.append(format!("Failed to refresh data: {e}"), LogLevel::Error);
                    }
                }
            }
            Response::Logs(Ok(lines)) => {
                trace!("Loaded {} historical log lines", lines.len());
                self.logs.set_history(lines);
            }
            Response::Logs(Err(e)) => {
                self.logs.append(format!("Failed to load logs: {e}"), LogLevel::Error);
            }
            Response::Export(Ok(path)) => {
                self.logs
                    .append(format!("Exported to {}", path.display()), LogLevel::Success);
            }
            Response::Export(Err(e)) => {
                self.logs.append(format!("Export failed: {e}"), LogLevel::Error);
            }
        }
    }

    fn apply_snapshot(&mut self, snapshot: StatusSnapshot) {
        let StatusSnapshot {
            summary,
            links,
            malformed,
        } = snapshot;

        self.breakdown = HealthBreakdown::from_records(&links);
        self.histogram = status_histogram(&links);
        self.summary = summary;
        self.engine.replace_data_set(links);
        self.clamp_selection();
        self.last_update = Some(Local::now());

        if malformed > 0 {
            self.logs.append(
                format!("{malformed} link records were incomplete and shown with defaults"),
                LogLevel::Warning,
            );
        }
        self.logs.append("Data refreshed", LogLevel::Success);
        self.set_status_message(format!("{} links loaded", self.engine.len()));
    }

    // -------------------- Control handling functions ---------------------- //

    fn enter_search(&mut self) {
        trace!("Entering search mode ...");
        self.modus = Modus::Search;
        self.input.set(self.engine.filter_term());
        self.last_input = self.input.get();
    }

    fn raw_input(&mut self, key: KeyEvent) {
        self.last_input = self.input.read(key);
        if self.last_input.changed {
            let term = self.last_input.input.clone();
            self.apply_filter(&term);
        }
        if self.last_input.canceled {
            self.set_status_message("Search cleared");
        }
        if self.last_input.finished {
            self.modus = Modus::Table;
        }
    }

    fn apply_filter(&mut self, term: &str) {
        self.engine.set_filter(term);
        self.selected_row = 0;
        self.set_status_message(format!("{} of {} links match", self.engine.matching(), self.engine.len()));
    }

    fn sort(&mut self, key: SortKey) {
        self.engine.set_sort(key);
        self.clamp_selection();
        let arrow = match self.engine.sort_direction() {
            SortDirection::Ascending => "ascending",
            SortDirection::Descending => "descending",
        };
        self.set_status_message(format!("Sorted by {} {}", key.title(), arrow));
    }

    fn change_page(&mut self, step: fn(&mut TableViewEngine)) {
        step(&mut self.engine);
        self.selected_row = 0;
        trace!("Page {} of {}", self.engine.current_page(), self.engine.total_pages());
    }

    fn clamp_selection(&mut self) {
        let rows = self.engine.page_slice().records.len();
        self.selected_row = std::cmp::min(self.selected_row, rows.saturating_sub(1));
    }

    fn toggle_logs(&mut self) {
        if self.logs.toggle() {
            self.request_logs(Instant::now());
        } else {
            self.log_refresh.reset();
        }
    }

    fn export(&mut self) {
        self.logs.append("Export requested", LogLevel::Info);
        if let Err(e) = self.fetcher.request_export() {
            self.logs.append(format!("Export failed: {e}"), LogLevel::Error);
        }
    }

    fn copy_selected_url(&mut self) {
        let Some(url) = self.selected_record().map(|r| r.url.clone()) else {
            return;
        };
        if self.clipboard.is_none() {
            match Clipboard::new() {
                Ok(c) => self.clipboard = Some(c),
                Err(e) => {
                    self.logs.append(format!("Clipboard unavailable: {e}"), LogLevel::Warning);
                    return;
                }
            }
        }
        if let Some(clipboard) = self.clipboard.as_mut() {
            match clipboard.set_text(url.clone()) {
                Ok(_) => {
                    info!("Copied {url} to clipboard");
                    self.set_status_message(format!("Copied {url}"));
                }
                Err(e) => self.logs.append(format!("Copy failed: {e}"), LogLevel::Warning),
            }
        }
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.last_status_message_update = Instant::now();
    }

    // -------------------- Read access for the ui ---------------------- //

    pub fn modus(&self) -> Modus {
        self.modus
    }

    pub fn engine(&self) -> &TableViewEngine {
        &self.engine
    }

    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    pub fn breakdown(&self) -> &HealthBreakdown {
        &self.breakdown
    }

    pub fn histogram(&self) -> &[(LinkStatus, usize)] {
        &self.histogram
    }

    pub fn logs(&self) -> &LogPanel {
        &self.logs
    }

    pub fn selected_row(&self) -> usize {
        self.selected_row
    }

    pub fn selected_record(&self) -> Option<&LinkRecord> {
        self.engine.page_slice().records.get(self.selected_row).copied()
    }

    pub fn search_input(&self) -> &InputResult {
        &self.last_input
    }

    pub fn status_message(&self) -> (&str, Instant) {
        (&self.status_message, self.last_status_message_update)
    }

    pub fn last_update(&self) -> Option<DateTime<Local>> {
        self.last_update
    }

    /// True while the fetch worker still has requests queued.
    pub fn busy(&self) -> bool {
        self.fetcher.busy()
    }

    /// Wall clock time of the next scheduled refresh.
    pub fn next_check(&self) -> Option<DateTime<Local>> {
        let next = self.refresh.next_at()?;
        let remaining = next.saturating_duration_since(Instant::now());
        TimeDelta::from_std(remaining).ok().map(|d| Local::now() + d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poller::tests::{FakeSource, wait_for};
    use crate::realtime::LogEvent;
    use ratatui::crossterm::event::{KeyCode, KeyModifiers};
    use std::time::Duration;

    fn model_with(source: FakeSource, dir: &std::path::Path) -> Model {
        let config = DashboardConfig::default()
            .with_export_dir(dir.to_path_buf())
            .with_log_refresh_interval(Duration::from_secs(3600));
        Model::init(&config, Box::new(source), RealtimeChannel::disabled())
    }

    fn settle(model: &mut Model, done: impl Fn(&Model) -> bool) {
        wait_for(|| {
            model.update(None).unwrap();
            done(model).then_some(())
        });
    }

    fn has_entry(model: &Model, prefix: &str) -> bool {
        model.logs().entries().iter().any(|e| e.message.starts_with(prefix))
    }

    fn key(model: &mut Model, code: KeyCode) {
        model
            .update(Some(Message::RawKey(KeyEvent::new(code, KeyModifiers::NONE))))
            .unwrap();
    }

    #[test]
    fn first_tick_loads_data() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = model_with(FakeSource::with_links(3), dir.path());
        settle(&mut model, |m| m.engine().len() == 3);

        assert_eq!(model.summary().total_links, 3);
        assert!(has_entry(&model, "Data refreshed"));
        assert!(model.last_update().is_some());
        assert!(model.next_check().is_some());
        assert!(!model.busy());
    }

    #[test]
    fn failed_refresh_keeps_last_good_data() {
        let dir = tempfile::tempdir().unwrap();
        let source = FakeSource::with_links(3);
        let mut model = model_with(source.clone(), dir.path());
        settle(&mut model, |m| m.engine().len() == 3);

        source.set_links(None);
        model.update(Some(Message::Refresh)).unwrap();
        settle(&mut model, |m| has_entry(m, "Failed to refresh data"));

        assert!(has_entry(&model, "Manual refresh requested"));
        assert_eq!(model.engine().len(), 3);
        assert_eq!(model.logs().last().unwrap().level, LogLevel::Error);
    }

    #[test]
    fn stale_snapshot_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let source = FakeSource::with_links(4);
        let mut model = model_with(source.clone(), dir.path());
        settle(&mut model, |m| m.engine().len() == 4);
        let applied = model.applied_seq;

        source.set_links(Some(9));
        let old = source.fetch_status().unwrap();
        model.handle_response(Response::Status {
            seq: applied,
            result: Ok(old),
        });
        assert_eq!(model.engine().len(), 4);
    }

    #[test]
    fn search_filters_live_and_resets_page() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = model_with(FakeSource::with_links(25), dir.path());
        settle(&mut model, |m| m.engine().len() == 25);

        model.update(Some(Message::NextPage)).unwrap();
        assert_eq!(model.engine().current_page(), 2);

        model.update(Some(Message::Search)).unwrap();
        assert!(model.raw_keyevents());
        key(&mut model, KeyCode::Char('1'));
        key(&mut model, KeyCode::Char('5'));
        assert_eq!(model.engine().filter_term(), "15");
        assert_eq!(model.engine().matching(), 1);
        assert_eq!(model.engine().current_page(), 1);

        key(&mut model, KeyCode::Enter);
        assert_eq!(model.modus(), Modus::Table);
        assert_eq!(model.engine().filter_term(), "15");

        model.update(Some(Message::Exit)).unwrap();
        assert_eq!(model.engine().matching(), 25);
    }

    #[test]
    fn sorting_keeps_page_and_selection_moves() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = model_with(FakeSource::with_links(25), dir.path());
        settle(&mut model, |m| m.engine().len() == 25);

        model.update(Some(Message::LastPage)).unwrap();
        model.update(Some(Message::SortBy(SortKey::Url))).unwrap();
        assert_eq!(model.engine().current_page(), 3);
        assert_eq!(model.selected_record().unwrap().url, "https://l20.com");

        for _ in 0..10 {
            model.update(Some(Message::MoveDown)).unwrap();
        }
        assert_eq!(model.selected_row(), 4);
        model.update(Some(Message::MoveUp)).unwrap();
        assert_eq!(model.selected_row(), 3);
    }

    #[test]
    fn realtime_events_are_appended_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let config = DashboardConfig::default().with_export_dir(dir.path().to_path_buf());
        let mut model = Model::init(
            &config,
            Box::new(FakeSource::with_links(1)),
            RealtimeChannel::from_receiver(rx),
        );

        tx.send(LogEvent::new("first", LogLevel::Info)).unwrap();
        tx.send(LogEvent::new("second", LogLevel::Error)).unwrap();
        model.update(None).unwrap();

        let messages: Vec<&str> = model.logs().entries().iter().map(|e| e.message.as_str()).collect();
        let first = messages.iter().position(|m| *m == "first").unwrap();
        assert_eq!(messages[first + 1], "second");
    }

    #[test]
    fn opening_logs_fetches_history() {
        let dir = tempfile::tempdir().unwrap();
        let source = FakeSource::with_links(1);
        source.logs.lock().unwrap().push("2025-01-01 INFO Monitoring done".into());
        let mut model = model_with(source, dir.path());

        model.update(Some(Message::ToggleLogs)).unwrap();
        assert!(model.logs().visible());
        settle(&mut model, |m| !m.logs().history().is_empty());
        assert_eq!(model.logs().history()[0], "2025-01-01 INFO Monitoring done");
    }

    #[test]
    fn export_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = model_with(FakeSource::with_links(1), dir.path());
        model.update(Some(Message::Export)).unwrap();
        settle(&mut model, |m| has_entry(m, "Exported to"));
        assert!(has_entry(&model, "Export requested"));
    }

    #[test]
    fn help_popup_and_quit() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = model_with(FakeSource::with_links(1), dir.path());
        model.update(Some(Message::Help)).unwrap();
        assert_eq!(model.modus(), Modus::Help);
        model.update(Some(Message::NextPage)).unwrap();
        assert_eq!(model.modus(), Modus::Help);
        model.update(Some(Message::Exit)).unwrap();
        assert_eq!(model.modus(), Modus::Table);
        model.update(Some(Message::Quit)).unwrap();
        assert_eq!(model.status, Status::Quitting);
    }
}
