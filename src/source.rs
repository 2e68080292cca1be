use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use reqwest::blocking::Client;
use serde_json::Value;
use tracing::{debug, info};

use crate::domain::DashError;
use crate::snapshot::StatusSnapshot;

pub const STATUS_ENDPOINT: &str = "/api/status";
pub const LOGS_ENDPOINT: &str = "/api/logs";
pub const EXPORT_ENDPOINT: &str = "/api/export";

/// Where the dashboard gets its data from.
pub trait DataSource: Send {
    fn fetch_status(&self) -> Result<StatusSnapshot, DashError>;
    fn fetch_logs(&self) -> Result<Vec<String>, DashError>;
    fn fetch_export(&self) -> Result<Vec<u8>, DashError>;
}

pub struct HttpDataSource {
    base_url: String,
    client: Client,
}

impl HttpDataSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, DashError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(HttpDataSource {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn get(&self, endpoint: &str) -> Result<reqwest::blocking::Response, DashError> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!("GET {url}");
        let response = self.client.get(&url).send()?;
        if !response.status().is_success() {
            return Err(DashError::HttpStatus {
                endpoint: endpoint.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(response)
    }
}

impl DataSource for HttpDataSource {
    fn fetch_status(&self) -> Result<StatusSnapshot, DashError> {
        let body = self.get(STATUS_ENDPOINT)?.text()?;
        StatusSnapshot::from_json(&body)
    }

    fn fetch_logs(&self) -> Result<Vec<String>, DashError> {
        let body = self.get(LOGS_ENDPOINT)?.text()?;
        parse_logs(&body)
    }

    fn fetch_export(&self) -> Result<Vec<u8>, DashError> {
        Ok(self.get(EXPORT_ENDPOINT)?.bytes()?.to_vec())
    }
}

pub fn parse_logs(body: &str) -> Result<Vec<String>, DashError> {
    let value: Value = serde_json::from_str(body)?;
    let lines = value
        .get("logs")
        .and_then(Value::as_array)
        .ok_or_else(|| DashError::Shape("`logs` is missing or not an array".into()))?;

    Ok(lines
        .iter()
        .map(|l| match l {
            Value::String(s) => s.trim_end().to_string(),
            other => other.to_string(),
        })
        .collect())
}

pub fn export_file_name(date: NaiveDate) -> String {
    format!("monitoramento_links_{}.csv", date.format("%Y-%m-%d"))
}

pub fn save_export(dir: &Path, date: NaiveDate, payload: &[u8]) -> Result<PathBuf, DashError> {
    fs::create_dir_all(dir)?;
    let path = dir.join(export_file_name(date));
    fs::write(&path, payload)?;
    info!("Wrote {} bytes to {}", payload.len(), path.display());
    Ok(path)
}
