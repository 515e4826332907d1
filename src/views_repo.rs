// SQLite `views` table. One connection per run; all writes go through a ViewsTx.
// (repo_name, date_time) is the natural key. It is backed by a plain index, not a
// UNIQUE constraint, so tables created by older tooling keep working.

use crate::error::ArchiveError;
use crate::models::{StoredRow, ViewCounts};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{Connection, Row, Sqlite, Transaction};
use std::path::Path;
use std::str::FromStr;
use tracing::instrument;

const SELECT_COUNTS_SQL: &str = "SELECT uniques, totals FROM views WHERE repo_name = ? AND date_time = ?";

const INSERT_SQL: &str =
    "INSERT INTO views(date_time, uniques, totals, download_dt, repo_name) VALUES(?, ?, ?, ?, ?)";

const UPDATE_SQL: &str = r#"
    UPDATE views
    SET uniques = ?,
        totals = ?,
        download_dt = ?
    WHERE repo_name = ?
        AND date_time = ?
"#;

pub struct ViewsRepo {
    conn: SqliteConnection,
}

impl ViewsRepo {
    /// Open a single connection at `path`, creating the parent dir and DB file if missing.
    pub async fn connect(path: &str) -> Result<Self, ArchiveError> {
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
        let conn = SqliteConnection::connect_with(&opts).await?;
        Ok(Self { conn })
    }

    /// Open an existing database for reading. Fails instead of creating a missing file.
    pub async fn open_existing(path: &str) -> Result<Self, ArchiveError> {
        if !Path::new(path).is_file() {
            return Err(ArchiveError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("database not found: {}", path),
            )));
        }
        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path))?
            .create_if_missing(false)
            .busy_timeout(std::time::Duration::from_secs(5));
        let conn = SqliteConnection::connect_with(&opts).await?;
        Ok(Self { conn })
    }

    pub async fn init(&mut self) -> Result<(), ArchiveError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS views (
                date_time TEXT NOT NULL,
                uniques INTEGER NOT NULL,
                totals INTEGER NOT NULL,
                download_dt TEXT NOT NULL,
                repo_name TEXT NOT NULL
            )
            "#,
        )
        .execute(&mut self.conn)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_views_repo_date_time ON views(repo_name, date_time)",
        )
        .execute(&mut self.conn)
        .await?;

        Ok(())
    }

    /// Start the run's transaction. Dropping the returned ViewsTx without `commit` rolls back.
    pub async fn begin(&mut self) -> Result<ViewsTx<'_>, ArchiveError> {
        let tx = self.conn.begin().await?;
        Ok(ViewsTx { tx })
    }

    /// Stored rows for one repository, ordered by date_time.
    #[instrument(skip(self), fields(table = "views", operation = "rows_for_repo"))]
    pub async fn rows_for_repo(&mut self, repo_name: &str) -> Result<Vec<StoredRow>, ArchiveError> {
        let rows = sqlx::query(
            "SELECT repo_name, date_time, uniques, totals, download_dt
             FROM views WHERE repo_name = ? ORDER BY date_time ASC",
        )
        .bind(repo_name)
        .fetch_all(&mut self.conn)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(StoredRow {
                repo_name: row.try_get("repo_name")?,
                date_time: row.try_get("date_time")?,
                uniques: row.try_get("uniques")?,
                totals: row.try_get("totals")?,
                download_dt: row.try_get("download_dt")?,
            });
        }
        Ok(out)
    }

    /// Distinct repository names present in the table.
    pub async fn repo_names(&mut self) -> Result<Vec<String>, ArchiveError> {
        let names = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT repo_name FROM views ORDER BY repo_name ASC",
        )
        .fetch_all(&mut self.conn)
        .await?;
        Ok(names)
    }

    pub async fn close(self) -> Result<(), ArchiveError> {
        self.conn.close().await?;
        Ok(())
    }
}

/// The run's open transaction. Issues the lookup, insert and update statements.
pub struct ViewsTx<'c> {
    tx: Transaction<'c, Sqlite>,
}

impl ViewsTx<'_> {
    /// `(uniques, totals)` for the natural key, or None. Duplicate keys are not expected; the first row wins.
    pub async fn find(
        &mut self,
        repo_name: &str,
        date_time: &str,
    ) -> Result<Option<ViewCounts>, ArchiveError> {
        let row = sqlx::query_as::<_, (i64, i64)>(SELECT_COUNTS_SQL)
            .bind(repo_name)
            .bind(date_time)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.map(|(uniques, totals)| ViewCounts { uniques, totals }))
    }

    pub async fn insert(&mut self, row: &StoredRow) -> Result<(), ArchiveError> {
        sqlx::query(INSERT_SQL)
            .bind(&row.date_time)
            .bind(row.uniques)
            .bind(row.totals)
            .bind(&row.download_dt)
            .bind(&row.repo_name)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    /// Overwrite counts and download_dt for the row's natural key. Returns rows affected.
    pub async fn update(&mut self, row: &StoredRow) -> Result<u64, ArchiveError> {
        let r = sqlx::query(UPDATE_SQL)
            .bind(row.uniques)
            .bind(row.totals)
            .bind(&row.download_dt)
            .bind(&row.repo_name)
            .bind(&row.date_time)
            .execute(&mut *self.tx)
            .await?;
        Ok(r.rows_affected())
    }

    pub async fn commit(self) -> Result<(), ArchiveError> {
        self.tx.commit().await?;
        Ok(())
    }
}
