// One archive run per repository: fetch traffic views, then reconcile into SQLite.

use crate::config::{AppConfig, RepositoryConfig};
use crate::error::ArchiveError;
use crate::github::GitHubClient;
use crate::reconciler::{ReconcilePolicy, ReconcileReport, Reconciler};
use crate::views_repo::ViewsRepo;
use chrono::Utc;
use tracing::{info, instrument, warn};

pub struct Archiver {
    client: GitHubClient,
    database_path: String,
    reconciler: Reconciler,
}

/// Totals across the repositories of one `archive_all` pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub rejected: usize,
}

impl ArchiveSummary {
    fn add(&mut self, report: &ReconcileReport) {
        self.succeeded += 1;
        self.inserted += report.inserted;
        self.updated += report.updated;
        self.unchanged += report.unchanged;
        self.rejected += report.rejected.len();
    }

    pub fn all_failed(&self) -> bool {
        self.failed > 0 && self.succeeded == 0
    }
}

impl Archiver {
    pub fn new(config: &AppConfig) -> Result<Self, ArchiveError> {
        Ok(Self {
            client: GitHubClient::new(&config.github)?,
            database_path: config.database.path.clone(),
            reconciler: Reconciler::new(ReconcilePolicy {
                skip_unchanged: config.reconcile.skip_unchanged,
            }),
        })
    }

    /// Archive one repository. A fetch failure returns before the database is opened.
    /// The connection is closed on success and dropped (rolling back) on error.
    #[instrument(skip(self, repository), fields(repo = %repository.full_name(), operation = "archive"))]
    pub async fn archive(
        &self,
        repository: &RepositoryConfig,
    ) -> Result<ReconcileReport, ArchiveError> {
        let run_timestamp = Utc::now();
        let entries = self
            .client
            .fetch_views(&repository.organization, &repository.name)
            .await?;

        let mut store = ViewsRepo::connect(&self.database_path).await?;
        store.init().await?;
        let report = self
            .reconciler
            .reconcile_entries(&mut store, &repository.name, &entries, run_timestamp)
            .await?;
        // Rows are committed by now; a close failure must not mark the run failed
        let report = settle(report, store.close().await);

        info!(
            fetched = entries.len(),
            applied = report.applied(),
            inserted = report.inserted,
            updated = report.updated,
            unchanged = report.unchanged,
            rejected = report.rejected.len(),
            "views archived"
        );
        Ok(report)
    }

    /// Archive each repository in order. One repository failing does not stop the others.
    pub async fn archive_all(&self, repositories: &[RepositoryConfig]) -> ArchiveSummary {
        let mut summary = ArchiveSummary::default();
        for repository in repositories {
            match self.archive(repository).await {
                Ok(report) => summary.add(&report),
                Err(e) => {
                    warn!(
                        repo = %repository.full_name(),
                        error = %e,
                        operation = "archive",
                        "archive run failed"
                    );
                    summary.failed += 1;
                }
            }
        }
        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            inserted = summary.inserted,
            updated = summary.updated,
            unchanged = summary.unchanged,
            rejected = summary.rejected,
            "archive pass complete"
        );
        summary
    }
}

/// Keep a committed run's report even when closing the connection fails.
fn settle(report: ReconcileReport, closed: Result<(), ArchiveError>) -> ReconcileReport {
    if let Err(e) = closed {
        warn!(error = %e, operation = "close", "closing store after commit failed");
    }
    report
}
