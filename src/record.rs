use std::cmp::Ordering;
use std::fmt;

use chrono::NaiveDateTime;
use serde_json::Value;

/// Marker the backend uses for links that could not be fetched at all.
pub const ERROR_MARKER: &str = "erro";

const TIMESTAMP_FORMATS: [&str; 2] = ["%d/%m/%Y %H:%M:%S", "%d-%m-%Y %H:%M:%S"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkStatus {
    Success,
    Other(u16),
    Error,
}

impl LinkStatus {
    pub fn from_code(code: u16) -> Self {
        if code == 200 {
            LinkStatus::Success
        } else {
            LinkStatus::Other(code)
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, LinkStatus::Success)
    }

    /// Total order over statuses: numeric codes by value, the error marker last.
    pub fn rank(&self) -> (u8, u16) {
        match self {
            LinkStatus::Success => (0, 200),
            LinkStatus::Other(code) => (0, *code),
            LinkStatus::Error => (1, 0),
        }
    }

    pub fn compare(&self, other: &LinkStatus) -> Ordering {
        self.rank().cmp(&other.rank())
    }

    fn decode(value: Option<&Value>) -> Option<Self> {
        match value? {
            Value::Number(n) => n
                .as_u64()
                .and_then(|c| u16::try_from(c).ok())
                .map(LinkStatus::from_code),
            Value::String(s) => match s.trim().parse::<u16>() {
                Ok(code) => Some(LinkStatus::from_code(code)),
                // "erro" and "Erro: <reason>" are both legitimate error markers
                Err(_) if s.to_lowercase().starts_with(ERROR_MARKER) => Some(LinkStatus::Error),
                Err(_) => None,
            },
            _ => None,
        }
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkStatus::Success => write!(f, "200"),
            LinkStatus::Other(code) => write!(f, "{code}"),
            LinkStatus::Error => write!(f, "{ERROR_MARKER}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinkRecord {
    pub url: String,
    pub status: LinkStatus,
    pub layout_ok: bool,
    pub pattern_ok: bool,
    pub timestamp: String,
}

impl LinkRecord {
    pub fn new(url: &str, status: LinkStatus, layout_ok: bool, pattern_ok: bool, timestamp: &str) -> Self {
        LinkRecord {
            url: url.to_string(),
            status,
            layout_ok,
            pattern_ok,
            timestamp: timestamp.to_string(),
        }
    }

    /// Decodes one backend link object. Fields that are missing or have the
    /// wrong type fall back to safe defaults; the flag reports whether that
    /// happened.
    pub fn decode(value: &Value) -> (LinkRecord, bool) {
        let mut defaulted = false;

        let mut text = |key: &str| match value.get(key).and_then(Value::as_str) {
            Some(s) => s.to_string(),
            None => {
                defaulted = true;
                String::new()
            }
        };
        let url = text("url");
        let timestamp = text("timestamp");

        let status = LinkStatus::decode(value.get("status")).unwrap_or_else(|| {
            defaulted = true;
            LinkStatus::Error
        });

        let mut flag = |keys: &[&str]| {
            let raw = keys.iter().find_map(|k| value.get(*k));
            match raw {
                Some(Value::Bool(b)) => *b,
                Some(Value::Number(n)) if n.as_u64() == Some(0) || n.as_u64() == Some(1) => {
                    n.as_u64() == Some(1)
                }
                _ => {
                    defaulted = true;
                    false
                }
            }
        };
        let layout_ok = flag(&["layoutOk"]);
        let pattern_ok = flag(&["padraoOk", "patternOk"]);

        (
            LinkRecord::new(&url, status, layout_ok, pattern_ok, &timestamp),
            defaulted,
        )
    }

    pub fn checked_at(&self) -> Option<NaiveDateTime> {
        parse_timestamp(&self.timestamp)
    }

    /// Case-insensitive substring match on url, status and timestamp.
    /// `term` must already be lower case.
    pub fn matches(&self, term: &str) -> bool {
        term.is_empty()
            || self.url.to_lowercase().contains(term)
            || self.status.to_string().contains(term)
            || self.timestamp.to_lowercase().contains(term)
    }
}

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}
