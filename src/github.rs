// GitHub traffic API client. Single attempt per call; retrying is the caller's business.

use crate::config::{GitHubConfig, Granularity};
use crate::error::FetchError;
use crate::models::{RawTrafficEntry, TrafficViews};
use crate::version;
use std::time::Duration;
use tracing::{debug, instrument};

/// Fallback when a 429 carries no usable Retry-After header.
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

pub struct GitHubClient {
    client: reqwest::Client,
    api_url: String,
    username: String,
    token: String,
    per: Granularity,
}

impl GitHubClient {
    pub fn new(config: &GitHubConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(version::user_agent())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FetchError::Init(e.to_string()))?;
        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            token: config.token.clone(),
            per: config.per,
        })
    }

    pub fn views_url(&self, organization: &str, repository: &str) -> String {
        format!(
            "{}/repos/{}/{}/traffic/views",
            self.api_url, organization, repository
        )
    }

    /// Fetch the views time-series for one repository. Entries are returned undecoded, in API order.
    #[instrument(skip(self), fields(operation = "fetch_views"))]
    pub async fn fetch_views(
        &self,
        organization: &str,
        repository: &str,
    ) -> Result<Vec<RawTrafficEntry>, FetchError> {
        let entity = format!("{}/{}", organization, repository);
        let response = self
            .client
            .get(self.views_url(organization, repository))
            .basic_auth(&self.username, Some(&self.token))
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .query(&[("per", self.per.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_for_status(&response, entity));
        }

        let body = response.text().await?;
        let views = parse_views(&body)?;
        debug!(
            entries = views.views.len(),
            total = views.count,
            uniques = views.uniques,
            "traffic views fetched"
        );
        Ok(views.views)
    }
}

fn parse_views(body: &str) -> Result<TrafficViews, FetchError> {
    serde_json::from_str(body).map_err(|e| FetchError::Malformed(e.to_string()))
}

fn error_for_status(response: &reqwest::Response, entity: String) -> FetchError {
    match response.status() {
        reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
            FetchError::AuthFailed(entity)
        }
        reqwest::StatusCode::NOT_FOUND => FetchError::NotFound(entity),
        reqwest::StatusCode::TOO_MANY_REQUESTS => FetchError::RateLimited {
            retry_after_secs: response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS),
        },
        status => FetchError::Status {
            status: status.as_u16(),
            entity,
        },
    }
}
