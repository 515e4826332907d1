// Insert-or-update of fetched traffic records against the `views` table.
// Every record of a run goes through one transaction; a malformed record is
// rejected and reported, anything the store refuses aborts the whole run.

use crate::error::{ArchiveError, RecordError};
use crate::models::{RawTrafficEntry, StoredRow, TrafficRecord};
use crate::timestamp;
use crate::views_repo::ViewsRepo;
use chrono::{DateTime, Utc};
use tracing::{debug, instrument, warn};

/// What happens when a fetched record matches a stored row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcilePolicy {
    /// false: always overwrite (download_dt always advances).
    /// true: leave the row alone when uniques and totals are unchanged.
    pub skip_unchanged: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Inserted,
    Updated,
    Unchanged,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub rejected: Vec<RecordError>,
}

impl ReconcileReport {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Inserted => self.inserted += 1,
            Outcome::Updated => self.updated += 1,
            Outcome::Unchanged => self.unchanged += 1,
        }
    }

    /// Records that reached the store (inserted, updated or left unchanged).
    pub fn applied(&self) -> usize {
        self.inserted + self.updated + self.unchanged
    }
}

#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    policy: ReconcilePolicy,
}

impl Reconciler {
    pub fn new(policy: ReconcilePolicy) -> Self {
        Self { policy }
    }

    /// Reconcile already-decoded records for `repository`, stamping writes with `run_timestamp`.
    pub async fn reconcile(
        &self,
        store: &mut ViewsRepo,
        repository: &str,
        records: &[TrafficRecord],
        run_timestamp: DateTime<Utc>,
    ) -> Result<ReconcileReport, ArchiveError> {
        self.apply(store, repository, records.iter().cloned().map(Ok), run_timestamp)
            .await
    }

    /// Reconcile raw API entries; entries that do not decode are rejected individually.
    pub async fn reconcile_entries(
        &self,
        store: &mut ViewsRepo,
        repository: &str,
        entries: &[RawTrafficEntry],
        run_timestamp: DateTime<Utc>,
    ) -> Result<ReconcileReport, ArchiveError> {
        let decoded = entries
            .iter()
            .map(|entry| entry.decode().map_err(|e| e.to_string()));
        self.apply(store, repository, decoded, run_timestamp).await
    }

    #[instrument(skip(self, store, records), fields(operation = "reconcile"))]
    async fn apply<I>(
        &self,
        store: &mut ViewsRepo,
        repository: &str,
        records: I,
        run_timestamp: DateTime<Utc>,
    ) -> Result<ReconcileReport, ArchiveError>
    where
        I: IntoIterator<Item = Result<TrafficRecord, String>>,
    {
        let download_dt = timestamp::format_download_dt(&run_timestamp);
        let mut report = ReconcileReport::default();
        let mut tx = store.begin().await?;

        for (index, item) in records.into_iter().enumerate() {
            let row = match item.and_then(|record| to_row(repository, &record, &download_dt)) {
                Ok(row) => row,
                Err(reason) => {
                    let err = RecordError::new(index, reason);
                    warn!(%repository, error = %err, "traffic record rejected");
                    report.rejected.push(err);
                    continue;
                }
            };

            let outcome = match tx.find(&row.repo_name, &row.date_time).await? {
                None => {
                    tx.insert(&row).await?;
                    Outcome::Inserted
                }
                Some(stored) if self.policy.skip_unchanged && stored == row.counts() => {
                    Outcome::Unchanged
                }
                Some(_) => {
                    tx.update(&row).await?;
                    Outcome::Updated
                }
            };
            debug!(date_time = %row.date_time, ?outcome, "record reconciled");
            report.record(outcome);
        }

        tx.commit().await?;
        Ok(report)
    }
}

/// Validate one record and turn it into the row it would be stored as.
fn to_row(repository: &str, record: &TrafficRecord, download_dt: &str) -> Result<StoredRow, String> {
    let date_time = timestamp::normalize_timestamp(&record.timestamp)
        .ok_or_else(|| format!("unrecognized timestamp {:?}", record.timestamp))?;
    if record.unique_count < 0 || record.total_count < 0 {
        return Err(format!(
            "negative counts (uniques={}, count={})",
            record.unique_count, record.total_count
        ));
    }
    Ok(StoredRow {
        repo_name: repository.to_string(),
        date_time,
        uniques: record.unique_count,
        totals: record.total_count,
        download_dt: download_dt.to_string(),
    })
}
