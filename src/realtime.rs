//! Push channel for live log lines.
//!
//! A websocket client runs on its own thread with a single-threaded async
//! runtime and forwards every decoded event into an unbounded queue. The UI
//! thread drains that queue on each tick, so events are never dropped and keep
//! their delivery order.

use std::thread;
use std::time::Duration;

use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

use crate::domain::DashError;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Success,
    Warning,
    Error,
    #[default]
    #[serde(other)]
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub message: String,
    pub level: LogLevel,
}

impl LogEvent {
    pub fn new(message: impl Into<String>, level: LogLevel) -> Self {
        LogEvent {
            message: message.into(),
            level,
        }
    }
}

#[derive(Deserialize)]
struct PlainEvent {
    message: String,
    #[serde(default)]
    level: LogLevel,
}

/// Per-link check event as emitted by the monitoring backend.
#[derive(Deserialize)]
struct CheckEvent {
    url: String,
    status: Value,
    #[serde(default)]
    hora: String,
}

/// Decodes one text frame. Accepts `{message, level}`, the backend's
/// `{url, status, hora}` check events and Socket.IO `42["log", {...}]` frames.
pub fn decode_frame(text: &str) -> Option<LogEvent> {
    let text = text.trim();
    let payload: Value = if text.starts_with('{') {
        serde_json::from_str(text).ok()?
    } else {
        // Socket.IO: numeric packet type followed by a JSON array
        let body = text.trim_start_matches(|c: char| c.is_ascii_digit());
        if body.len() == text.len() {
            return None;
        }
        let mut packet: Vec<Value> = serde_json::from_str(body).ok()?;
        if packet.len() < 2 || packet[0].as_str() != Some("log") {
            return None;
        }
        packet.swap_remove(1)
    };

    if let Ok(event) = serde_json::from_value::<PlainEvent>(payload.clone()) {
        return Some(LogEvent::new(event.message, event.level));
    }
    let check: CheckEvent = serde_json::from_value(payload).ok()?;
    let (status, level) = match &check.status {
        Value::Number(n) if n.as_u64() == Some(200) => ("200".to_string(), LogLevel::Success),
        Value::String(s) => (s.clone(), LogLevel::Error),
        other => (other.to_string(), LogLevel::Error),
    };
    let message = if check.hora.is_empty() {
        format!("{} -> {}", check.url, status)
    } else {
        format!("{} -> {} ({})", check.url, status, check.hora)
    };
    Some(LogEvent::new(message, level))
}

pub struct RealtimeChannel {
    rx: Option<UnboundedReceiver<LogEvent>>,
}

impl RealtimeChannel {
    pub fn disabled() -> Self {
        RealtimeChannel { rx: None }
    }

    pub fn connect(ws_url: &str) -> Result<Self, DashError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let url = ws_url.to_string();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        thread::Builder::new()
            .name("realtime-log".into())
            .spawn(move || runtime.block_on(subscribe(url, tx)))?;

        Ok(RealtimeChannel { rx: Some(rx) })
    }

    #[cfg(test)]
    pub(crate) fn from_receiver(rx: UnboundedReceiver<LogEvent>) -> Self {
        RealtimeChannel { rx: Some(rx) }
    }

    pub fn enabled(&self) -> bool {
        self.rx.is_some()
    }

    pub fn drain(&mut self) -> Vec<LogEvent> {
        let mut out = Vec::new();
        if let Some(rx) = self.rx.as_mut() {
            while let Ok(event) = rx.try_recv() {
                out.push(event);
            }
        }
        out
    }
}

async fn subscribe(url: String, tx: UnboundedSender<LogEvent>) {
    loop {
        let outcome = match tokio_tungstenite::connect_async(url.as_str()).await {
            Ok((mut stream, _)) => {
                info!("Realtime log channel connected to {url}");
                if tx
                    .send(LogEvent::new("Realtime log channel connected", LogLevel::Info))
                    .is_err()
                {
                    return;
                }
                let mut end = DashError::Realtime("connection closed".into());
                while let Some(frame) = stream.next().await {
                    match frame {
                        Ok(WsMessage::Text(text)) => {
                            if let Some(event) = decode_frame(text.as_str()) {
                                if tx.send(event).is_err() {
                                    return;
                                }
                            } else {
                                debug!("Ignoring realtime frame {text:?}");
                            }
                        }
                        Ok(WsMessage::Close(_)) => break,
                        Ok(_) => {}
                        Err(e) => {
                            end = DashError::Realtime(e.to_string());
                            break;
                        }
                    }
                }
                end
            }
            Err(e) => DashError::Realtime(e.to_string()),
        };

        warn!("Realtime log channel lost: {outcome}");
        let notice = LogEvent::new(
            format!("Realtime log channel unavailable ({outcome}), retrying"),
            LogLevel::Warning,
        );
        if tx.send(notice).is_err() {
            return;
        }
        tokio::time::sleep(RECONNECT_DELAY).await;
        if tx.is_closed() {
            return;
        }
    }
}
