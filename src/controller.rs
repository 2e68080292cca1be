use std::time::Duration;
use tracing::trace;

use ratatui::crossterm::event::{self, Event, KeyCode};
use crate::domain::{DashboardConfig, DashError, Message};
use crate::engine::SortKey;
use crate::model::Model;

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &DashboardConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    /// Waits up to the poll time for a key press. `None` doubles as the
    /// refresh tick for the model.
    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, DashError> {
        if event::poll(Duration::from_millis(self.event_poll_time))?
            && let Event::Key(key) = event::read()?
            && key.kind == event::KeyEventKind::Press
        {
            if model.raw_keyevents() {
                return Ok(Some(Message::RawKey(key)));
            }
            return Ok(Self::handle_key(key));
        }
        Ok(None)
    }

    fn handle_key(key: event::KeyEvent) -> Option<Message> {
        let message = match key.code {
            KeyCode::Char('q') => Some(Message::Quit),
            KeyCode::Char('r') => Some(Message::Refresh),
            KeyCode::Char('/') => Some(Message::Search),
            KeyCode::Char('1') => Some(Message::SortBy(SortKey::Url)),
            KeyCode::Char('2') => Some(Message::SortBy(SortKey::Status)),
            KeyCode::Char('3') => Some(Message::SortBy(SortKey::Layout)),
            KeyCode::Char('4') => Some(Message::SortBy(SortKey::Pattern)),
            KeyCode::Char('5') => Some(Message::SortBy(SortKey::Timestamp)),
            KeyCode::Right | KeyCode::Char('n') => Some(Message::NextPage),
            KeyCode::Left | KeyCode::Char('p') => Some(Message::PrevPage),
            KeyCode::Home | KeyCode::Char('g') => Some(Message::FirstPage),
            KeyCode::End | KeyCode::Char('G') => Some(Message::LastPage),
            KeyCode::Up | KeyCode::Char('k') => Some(Message::MoveUp),
            KeyCode::Down | KeyCode::Char('j') => Some(Message::MoveDown),
            KeyCode::Char('y') => Some(Message::CopyUrl),
            KeyCode::Char('l') => Some(Message::ToggleLogs),
            KeyCode::Char('c') => Some(Message::ClearLogs),
            KeyCode::PageUp => Some(Message::ScrollLogsUp),
            KeyCode::PageDown => Some(Message::ScrollLogsDown),
            KeyCode::Char('e') => Some(Message::Export),
            KeyCode::Char('?') => Some(Message::Help),
            KeyCode::Esc => Some(Message::Exit),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}
