// Traffic records as GitHub sends them, and rows as the `views` table stores them.

use serde::{Deserialize, Serialize};

/// One measurement bucket from `GET /repos/{owner}/{repo}/traffic/views`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficRecord {
    /// Bucket start, e.g. "2023-01-01T00:00:00Z".
    pub timestamp: String,
    #[serde(rename = "uniques")]
    pub unique_count: i64,
    #[serde(rename = "count")]
    pub total_count: i64,
}

impl TrafficRecord {
    pub fn new(timestamp: impl Into<String>, unique_count: i64, total_count: i64) -> Self {
        Self {
            timestamp: timestamp.into(),
            unique_count,
            total_count,
        }
    }
}

/// Undecoded entry of the `views` array. Decoding is deferred so one bad entry
/// only rejects itself instead of failing the whole response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct RawTrafficEntry(pub serde_json::Value);

impl RawTrafficEntry {
    pub fn decode(&self) -> Result<TrafficRecord, serde_json::Error> {
        TrafficRecord::deserialize(&self.0)
    }
}

impl From<&TrafficRecord> for RawTrafficEntry {
    fn from(record: &TrafficRecord) -> Self {
        RawTrafficEntry(serde_json::json!({
            "timestamp": record.timestamp,
            "uniques": record.unique_count,
            "count": record.total_count,
        }))
    }
}

/// Response body of the traffic views endpoint. The totals are optional; only `views` is required.
#[derive(Debug, Clone, Deserialize)]
pub struct TrafficViews {
    #[serde(default)]
    pub count: Option<i64>,
    #[serde(default)]
    pub uniques: Option<i64>,
    pub views: Vec<RawTrafficEntry>,
}

/// `(uniques, totals)` currently stored for a natural key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewCounts {
    pub uniques: i64,
    pub totals: i64,
}

/// One row of the `views` table. `(repo_name, date_time)` is the natural key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredRow {
    pub repo_name: String,
    pub date_time: String,
    pub uniques: i64,
    pub totals: i64,
    pub download_dt: String,
}

impl StoredRow {
    pub fn counts(&self) -> ViewCounts {
        ViewCounts {
            uniques: self.uniques,
            totals: self.totals,
        }
    }
}
