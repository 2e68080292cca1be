use std::collections::HashMap;

use rayon::prelude::*;
use serde_json::Value;
use tracing::debug;

use crate::domain::DashError;
use crate::record::{LinkRecord, LinkStatus};

pub const NO_CHECK_YET: &str = "--:--:--";

/// Aggregate counters as reported by the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub total_links: u64,
    pub success: u64,
    pub errors: u64,
    pub success_percent: u64,
    pub error_percent: u64,
    pub last_check: String,
}

impl Default for Summary {
    fn default() -> Self {
        Summary {
            total_links: 0,
            success: 0,
            errors: 0,
            success_percent: 0,
            error_percent: 0,
            last_check: NO_CHECK_YET.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HealthBreakdown {
    pub healthy: usize,
    pub warning: usize,
    pub error: usize,
}

impl HealthBreakdown {
    pub fn from_records(records: &[LinkRecord]) -> Self {
        records.iter().fold(HealthBreakdown::default(), |mut acc, r| {
            match (r.status.is_success(), r.layout_ok && r.pattern_ok) {
                (true, true) => acc.healthy += 1,
                (true, false) => acc.warning += 1,
                (false, _) => acc.error += 1,
            }
            acc
        })
    }
}

/// One decoded `/api/status` response.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub summary: Summary,
    pub links: Vec<LinkRecord>,
    pub malformed: usize,
}

impl StatusSnapshot {
    pub fn from_json(body: &str) -> Result<Self, DashError> {
        let value: Value = serde_json::from_str(body)?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Result<Self, DashError> {
        let object = value
            .as_object()
            .ok_or_else(|| DashError::Shape("status body is not an object".into()))?;

        let raw_links = match object.get("links") {
            Some(Value::Array(items)) => items.as_slice(),
            None | Some(Value::Null) => &[],
            Some(_) => return Err(DashError::Shape("`links` is not an array".into())),
        };

        let decoded: Vec<(LinkRecord, bool)> = raw_links.par_iter().map(LinkRecord::decode).collect();
        let malformed = decoded.iter().filter(|(_, defaulted)| *defaulted).count();
        let links: Vec<LinkRecord> = decoded.into_iter().map(|(r, _)| r).collect();

        let count = |key: &str| object.get(key).and_then(Value::as_u64).unwrap_or(0);
        let total_links = count("totalLinks");
        let success = count("status200");
        let errors = count("statusError");
        let percent = |key: &str, part: u64| {
            object
                .get(key)
                .and_then(Value::as_f64)
                .map(|p| p.round().max(0.0) as u64)
                .unwrap_or_else(|| percent_of(part, total_links))
        };

        let summary = Summary {
            total_links,
            success,
            errors,
            success_percent: percent("status200Percent", success),
            error_percent: percent("statusErrorPercent", errors),
            last_check: object
                .get("lastCheck")
                .and_then(Value::as_str)
                .unwrap_or(NO_CHECK_YET)
                .to_string(),
        };
        debug!(
            "Decoded snapshot: {} links, {} malformed, summary {:?}",
            links.len(),
            malformed,
            summary
        );

        Ok(StatusSnapshot {
            summary,
            links,
            malformed,
        })
    }
}

fn percent_of(part: u64, total: u64) -> u64 {
    if total == 0 {
        0
    } else {
        (part as f64 * 100.0 / total as f64).round() as u64
    }
}

/// Number of links per status, in status order.
pub fn status_histogram(records: &[LinkRecord]) -> Vec<(LinkStatus, usize)> {
    let mut counts: HashMap<LinkStatus, usize> = HashMap::new();
    for r in records {
        *counts.entry(r.status).or_insert(0) += 1;
    }
    let mut sorted: Vec<(LinkStatus, usize)> = counts.into_iter().collect();
    sorted.sort_by(|(a, _), (b, _)| a.compare(b));
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{
        "totalLinks": 3,
        "status200": 2,
        "statusError": 1,
        "lastCheck": "10/06/2025 14:00:00",
        "links": [
            {"url": "https://a.com", "status": 200, "layoutOk": true, "padraoOk": true, "timestamp": "10/06/2025 14:00:00"},
            {"url": "https://b.com", "status": 200, "layoutOk": false, "padraoOk": true, "timestamp": "10/06/2025 14:00:01"},
            {"url": "https://c.com", "status": "erro", "layoutOk": false, "padraoOk": false, "timestamp": "10/06/2025 14:00:02"}
        ]
    }"#;

    #[test]
    fn decodes_body_and_derives_percentages() {
        let snap = StatusSnapshot::from_json(BODY).unwrap();
        assert_eq!(snap.links.len(), 3);
        assert_eq!(snap.malformed, 0);
        assert_eq!(snap.summary.total_links, 3);
        assert_eq!(snap.summary.success_percent, 67);
        assert_eq!(snap.summary.error_percent, 33);
        assert_eq!(snap.summary.last_check, "10/06/2025 14:00:00");
        assert_eq!(snap.links[2].status, LinkStatus::Error);
    }

    #[test]
    fn prefers_precomputed_percentages() {
        let snap = StatusSnapshot::from_json(
            r#"{"totalLinks": 4, "status200": 1, "status200Percent": 26.4, "statusErrorPercent": 75}"#,
        )
        .unwrap();
        assert_eq!(snap.summary.success_percent, 26);
        assert_eq!(snap.summary.error_percent, 75);
        assert_eq!(snap.summary.last_check, NO_CHECK_YET);
        assert!(snap.links.is_empty());
    }

    #[test]
    fn bad_link_does_not_hide_the_rest() {
        let snap = StatusSnapshot::from_json(
            r#"{"totalLinks": 2, "links": [{"status": 200}, {"url": "ok.com", "status": 200, "layoutOk": true, "padraoOk": true, "timestamp": "x"}]}"#,
        )
        .unwrap();
        assert_eq!(snap.links.len(), 2);
        assert_eq!(snap.malformed, 1);
        assert_eq!(snap.links[1].url, "ok.com");
    }

    #[test]
    fn rejects_wrong_shapes() {
        assert!(StatusSnapshot::from_json("[1, 2]").is_err());
        assert!(StatusSnapshot::from_json(r#"{"links": 3}"#).is_err());
        assert!(StatusSnapshot::from_json("<html>").is_err());
    }

    #[test]
    fn breakdown_and_histogram() {
        let snap = StatusSnapshot::from_json(BODY).unwrap();
        assert_eq!(
            HealthBreakdown::from_records(&snap.links),
            HealthBreakdown {
                healthy: 1,
                warning: 1,
                error: 1
            }
        );
        assert_eq!(
            status_histogram(&snap.links),
            vec![(LinkStatus::Success, 2), (LinkStatus::Error, 1)]
        );
    }

    #[test]
    fn zero_total_means_zero_percent() {
        assert_eq!(percent_of(5, 0), 0);
        assert_eq!(percent_of(1, 3), 33);
    }
}
