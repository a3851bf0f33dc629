//! Incident records and the GraphQL response envelope

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// One reported funds-loss event from the `rekts` listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    pub id: u64,
    pub date: Option<String>,
    pub project_name: String,
    pub category: String,
    pub funds_lost: i64,
    pub issue_type: String,
}

impl Incident {
    /// Parsed incident date, `None` when missing or not ISO-8601
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.date.as_deref().and_then(parse_date)
    }
}

/// Parse the ISO-8601 shapes the API has been seen to return.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

// ─── GraphQL envelope ───────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct RektsEnvelope {
    data: Option<RektsData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct RektsData {
    rekts: Vec<Incident>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

impl RektsEnvelope {
    /// Unwrap `data.rekts`, or the joined GraphQL error messages.
    pub(crate) fn into_page(self) -> Result<Vec<Incident>, String> {
        match self.data {
            Some(data) => Ok(data.rekts),
            None if self.errors.is_empty() => Err("response has no data".to_string()),
            None => Err(self
                .errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join("; ")),
        }
    }
}
