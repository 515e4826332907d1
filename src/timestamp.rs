// Timestamp normalization for the `views` table.
// date_time is the UTC calendar day of the bucket; download_dt is the run time.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Format of `views.date_time` (natural key component).
pub const DATE_TIME_FORMAT: &str = "%Y-%m-%d";

/// Format of `views.download_dt`.
pub const DOWNLOAD_DT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Normalize a GitHub bucket timestamp to the store key format.
///
/// Accepts RFC 3339 (`2023-01-01T00:00:00Z`, offsets converted to UTC), a naive
/// `YYYY-MM-DDTHH:MM:SS` (taken as UTC) or a bare `YYYY-MM-DD`.
/// Returns `None` when the string matches none of these.
pub fn normalize_timestamp(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc).format(DATE_TIME_FORMAT).to_string());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.format(DATE_TIME_FORMAT).to_string());
    }
    NaiveDate::parse_from_str(raw, DATE_TIME_FORMAT)
        .ok()
        .map(|d| d.format(DATE_TIME_FORMAT).to_string())
}

pub fn format_download_dt(at: &DateTime<Utc>) -> String {
    at.format(DOWNLOAD_DT_FORMAT).to_string()
}
