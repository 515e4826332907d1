// Shared test helpers: temp databases, configs and a local stand-in for the GitHub traffic API.
#![allow(dead_code)]

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use repostats::config::AppConfig;
use repostats::views_repo::ViewsRepo;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub struct TestDb {
    // Keeps the directory alive for the duration of the test
    pub dir: TempDir,
    pub path: String,
}

pub fn temp_db() -> TestDb {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data").join("githubstats.db");
    let path = path.to_str().unwrap().to_string();
    TestDb { dir, path }
}

pub async fn open_store(db: &TestDb) -> ViewsRepo {
    let mut repo = ViewsRepo::connect(&db.path).await.unwrap();
    repo.init().await.unwrap();
    repo
}

/// Canned reply plus what the fake API saw.
#[derive(Clone)]
pub struct FakeGitHub {
    inner: Arc<Mutex<FakeState>>,
    pub base_url: String,
}

struct FakeState {
    replies: HashMap<String, (StatusCode, String)>,
    requests: Vec<SeenRequest>,
}

#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub path: String,
    pub per: Option<String>,
    pub authorization: Option<String>,
}

impl FakeGitHub {
    /// Serve `body` with `status` for `org/repo`. Unknown repositories get 404.
    pub fn reply(&self, full_name: &str, status: StatusCode, body: impl Into<String>) {
        self.inner
            .lock()
            .unwrap()
            .replies
            .insert(full_name.to_string(), (status, body.into()));
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.inner.lock().unwrap().requests.clone()
    }
}

pub async fn spawn_fake_github() -> FakeGitHub {
    let inner = Arc::new(Mutex::new(FakeState {
        replies: HashMap::new(),
        requests: Vec::new(),
    }));
    let app = Router::new()
        .route("/repos/{org}/{repo}/traffic/views", get(views_handler))
        .with_state(inner.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    FakeGitHub {
        inner,
        base_url: format!("http://{}", addr),
    }
}

async fn views_handler(
    State(state): State<Arc<Mutex<FakeState>>>,
    Path((org, repo)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let full_name = format!("{}/{}", org, repo);
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let mut state = state.lock().unwrap();
    state.requests.push(SeenRequest {
        path: format!("/repos/{}/traffic/views", full_name),
        per: query.get("per").cloned(),
        authorization: authorization.clone(),
    });

    if authorization.is_none() {
        return (StatusCode::UNAUTHORIZED, r#"{"message":"Requires authentication"}"#).into_response();
    }
    match state.replies.get(&full_name) {
        Some((status, body)) => (
            *status,
            [(header::CONTENT_TYPE, "application/json")],
            body.clone(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, r#"{"message":"Not Found"}"#).into_response(),
    }
}

/// `views` body as GitHub returns it.
pub fn views_body(entries: &[(&str, i64, i64)]) -> String {
    let views: Vec<serde_json::Value> = entries
        .iter()
        .map(|(timestamp, count, uniques)| {
            serde_json::json!({ "timestamp": timestamp, "count": count, "uniques": uniques })
        })
        .collect();
    let count: i64 = entries.iter().map(|e| e.1).sum();
    let uniques: i64 = entries.iter().map(|e| e.2).sum();
    serde_json::json!({ "count": count, "uniques": uniques, "views": views }).to_string()
}

pub fn test_config(api_url: &str, db_path: &str, repositories: &[(&str, &str)]) -> AppConfig {
    let mut s = format!(
        r#"
[github]
api_url = "{}"
username = "octocat"
token = "ghp_test"
timeout_secs = 5

[database]
path = "{}"
"#,
        api_url,
        db_path.replace('\\', "/")
    );
    for (org, name) in repositories {
        s.push_str(&format!(
            "\n[[repositories]]\norganization = \"{}\"\nname = \"{}\"\n",
            org, name
        ));
    }
    AppConfig::load_from_str(&s).unwrap()
}
