// ViewsRepo tests: connect, init, transactional insert/update/find, rollback

mod common;

use common::{open_store, temp_db};
use repostats::models::{StoredRow, ViewCounts};
use repostats::views_repo::ViewsRepo;
use std::sync::{Arc, Mutex};
use tracing::span::{Attributes, Id};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

fn row(repo: &str, date_time: &str, uniques: i64, totals: i64, download_dt: &str) -> StoredRow {
    StoredRow {
        repo_name: repo.into(),
        date_time: date_time.into(),
        uniques,
        totals,
        download_dt: download_dt.into(),
    }
}

#[tokio::test]
async fn views_repo_connect_creates_parent_dir_and_init_is_idempotent() {
    let db = temp_db();
    let mut repo = ViewsRepo::connect(&db.path).await.unwrap();
    repo.init().await.unwrap();
    // Second init is no-op (IF NOT EXISTS)
    repo.init().await.unwrap();
    assert!(std::path::Path::new(&db.path).exists());
    assert!(repo.rows_for_repo("gcam-core").await.unwrap().is_empty());
    repo.close().await.unwrap();
}

#[tokio::test]
async fn views_repo_insert_find_update_commit() {
    let db = temp_db();
    let mut repo = open_store(&db).await;

    let mut tx = repo.begin().await.unwrap();
    assert_eq!(tx.find("gcam-core", "2023-01-01").await.unwrap(), None);
    tx.insert(&row("gcam-core", "2023-01-01", 4, 10, "2023-01-15 00:00:00"))
        .await
        .unwrap();
    assert_eq!(
        tx.find("gcam-core", "2023-01-01").await.unwrap(),
        Some(ViewCounts {
            uniques: 4,
            totals: 10
        })
    );
    let affected = tx
        .update(&row("gcam-core", "2023-01-01", 6, 15, "2023-01-16 00:00:00"))
        .await
        .unwrap();
    assert_eq!(affected, 1);
    tx.commit().await.unwrap();

    let rows = repo.rows_for_repo("gcam-core").await.unwrap();
    assert_eq!(
        rows,
        vec![row("gcam-core", "2023-01-01", 6, 15, "2023-01-16 00:00:00")]
    );
}

#[tokio::test]
async fn views_repo_update_of_missing_key_affects_nothing() {
    let db = temp_db();
    let mut repo = open_store(&db).await;
    let mut tx = repo.begin().await.unwrap();
    let affected = tx
        .update(&row("gcam-core", "2023-01-01", 1, 1, "x"))
        .await
        .unwrap();
    assert_eq!(affected, 0);
    tx.commit().await.unwrap();
    assert!(repo.rows_for_repo("gcam-core").await.unwrap().is_empty());
}

#[tokio::test]
async fn views_repo_dropped_transaction_rolls_back() {
    let db = temp_db();
    let mut repo = open_store(&db).await;
    {
        let mut tx = repo.begin().await.unwrap();
        tx.insert(&row("gcam-core", "2023-01-01", 4, 10, "x"))
            .await
            .unwrap();
        // dropped without commit
    }
    assert!(repo.rows_for_repo("gcam-core").await.unwrap().is_empty());
}

#[tokio::test]
async fn views_repo_rows_are_scoped_by_repo_and_ordered() {
    let db = temp_db();
    let mut repo = open_store(&db).await;
    let mut tx = repo.begin().await.unwrap();
    tx.insert(&row("hector", "2023-01-02", 1, 2, "x")).await.unwrap();
    tx.insert(&row("gcam-core", "2023-01-03", 3, 3, "x")).await.unwrap();
    tx.insert(&row("gcam-core", "2023-01-01", 1, 1, "x")).await.unwrap();
    tx.commit().await.unwrap();

    let dates: Vec<String> = repo
        .rows_for_repo("gcam-core")
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.date_time)
        .collect();
    assert_eq!(dates, vec!["2023-01-01", "2023-01-03"]);
    assert_eq!(
        repo.repo_names().await.unwrap(),
        vec!["gcam-core".to_string(), "hector".to_string()]
    );
}

#[tokio::test]
async fn views_repo_data_survives_reconnect() {
    let db = temp_db();
    let mut repo = open_store(&db).await;
    let mut tx = repo.begin().await.unwrap();
    tx.insert(&row("gcam-core", "2023-01-01", 4, 10, "x")).await.unwrap();
    tx.commit().await.unwrap();
    repo.close().await.unwrap();

    let mut reopened = open_store(&db).await;
    let rows = reopened.rows_for_repo("gcam-core").await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].counts(), ViewCounts { uniques: 4, totals: 10 });
}

#[tokio::test]
async fn open_existing_fails_on_missing_database_without_creating_it() {
    let db = temp_db();
    assert!(ViewsRepo::open_existing(&db.path).await.is_err());
    assert!(!std::path::Path::new(&db.path).exists());
    assert!(!std::path::Path::new(&db.path).parent().unwrap().exists());
}

#[tokio::test]
async fn open_existing_reads_rows_written_by_a_run() {
    let db = temp_db();
    let mut repo = open_store(&db).await;
    let mut tx = repo.begin().await.unwrap();
    tx.insert(&row("gcam-core", "2023-01-01", 4, 10, "x")).await.unwrap();
    tx.commit().await.unwrap();
    repo.close().await.unwrap();

    let mut reader = ViewsRepo::open_existing(&db.path).await.unwrap();
    assert_eq!(reader.repo_names().await.unwrap(), vec!["gcam-core".to_string()]);
    assert_eq!(reader.rows_for_repo("gcam-core").await.unwrap().len(), 1);
}

/// Records the field names declared on `rows_for_repo` spans.
struct SpanFields(Arc<Mutex<Vec<String>>>);

impl<S: tracing::Subscriber> Layer<S> for SpanFields {
    fn on_new_span(&self, attrs: &Attributes<'_>, _id: &Id, _ctx: Context<'_, S>) {
        if attrs.metadata().name() == "rows_for_repo" {
            let mut names = self.0.lock().unwrap();
            names.extend(attrs.metadata().fields().iter().map(|f| f.name().to_string()));
        }
    }
}

#[tokio::test]
async fn rows_for_repo_span_does_not_reuse_repo_field() {
    let names = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::registry().with(SpanFields(names.clone()));
    let _guard = tracing::subscriber::set_default(subscriber);

    let db = temp_db();
    let mut repo = open_store(&db).await;
    repo.rows_for_repo("gcam-core").await.unwrap();

    let names = names.lock().unwrap().clone();
    assert!(names.contains(&"table".to_string()), "got {names:?}");
    assert!(!names.contains(&"repo".to_string()), "got {names:?}");
}
