use std::io::Error;
use std::path::PathBuf;
use std::time::Duration;

use derive_setters::Setters;
use ratatui::crossterm::event::KeyEvent;
use thiserror::Error;

use crate::engine::SortKey;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:5000";
pub const STATUS_REFRESH_SECS: u64 = 30;
pub const LOG_REFRESH_SECS: u64 = 5;

pub const HELP_TEXT: &str = "\
linkdash - link monitoring dashboard

  q            quit
  r            refresh now
  /            search (Enter keeps the term, Esc clears it)
  1 .. 5       sort by url, status, layout, pattern, checked at
               (again on the same column flips the direction)
  ← / →        previous / next page
  Home / End   first / last page
  ↑ / ↓        select row
  y            copy url of the selected row
  l            show / hide the log panel
  c            clear logs
  PgUp / PgDn  scroll the log panel
  e            export csv
  ?            this help
  Esc          close popup";

#[derive(Debug, Error)]
pub enum DashError {
    #[error("io error: {0}")]
    Io(#[from] Error),
    #[error("network failure: {0}")]
    Network(#[from] reqwest::Error),
    #[error("{endpoint} answered with HTTP {status}")]
    HttpStatus { endpoint: String, status: u16 },
    #[error("malformed response: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unexpected response shape: {0}")]
    Shape(String),
    #[error("realtime channel: {0}")]
    Realtime(String),
    #[error("background worker is gone")]
    WorkerGone,
}

/// Coarse failure classes used when reporting errors to the log panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Network,
    Parse,
    Io,
    Internal,
}

impl DashError {
    pub fn kind(&self) -> FailureKind {
        match self {
            DashError::Network(e) if e.is_decode() => FailureKind::Parse,
            DashError::Network(_) | DashError::HttpStatus { .. } | DashError::Realtime(_) => {
                FailureKind::Network
            }
            DashError::Parse(_) | DashError::Shape(_) => FailureKind::Parse,
            DashError::Io(_) => FailureKind::Io,
            DashError::WorkerGone => FailureKind::Internal,
        }
    }
}

#[derive(Debug, Clone, Setters)]
#[setters(prefix = "with_")]
pub struct DashboardConfig {
    pub api_url: String,
    #[setters(strip_option)]
    pub ws_url: Option<String>,
    pub refresh_interval: Duration,
    pub log_refresh_interval: Duration,
    pub request_timeout: Duration,
    pub export_dir: PathBuf,
    pub event_poll_time: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            ws_url: None,
            refresh_interval: Duration::from_secs(STATUS_REFRESH_SECS),
            log_refresh_interval: Duration::from_secs(LOG_REFRESH_SECS),
            request_timeout: Duration::from_secs(10),
            export_dir: PathBuf::from("."),
            event_poll_time: 100,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    Quit,
    Refresh,
    Search,
    RawKey(KeyEvent),
    SortBy(SortKey),
    NextPage,
    PrevPage,
    FirstPage,
    LastPage,
    MoveUp,
    MoveDown,
    CopyUrl,
    ToggleLogs,
    ClearLogs,
    ScrollLogsUp,
    ScrollLogsDown,
    Export,
    Help,
    Exit,
}
