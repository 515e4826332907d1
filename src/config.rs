use serde::Deserialize;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub github: GitHubConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    /// Absent: archive every repository once and exit.
    #[serde(default)]
    pub schedule: Option<ScheduleConfig>,
    #[serde(default)]
    pub repositories: Vec<RepositoryConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    pub username: String,
    /// Personal access token. Falls back to $GITHUB_TOKEN when empty (see `AppConfig::load`).
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub per: Granularity,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_url() -> String {
    "https://api.github.com".into()
}

fn default_timeout_secs() -> u64 {
    30
}

/// Bucket size requested from the traffic API (`per` query parameter).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    Day,
    Week,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Day => "day",
            Granularity::Week => "week",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReconcileConfig {
    /// Leave rows untouched (download_dt included) when fetched counts equal stored counts.
    #[serde(default)]
    pub skip_unchanged: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    /// Cron expression with seconds field, local time (e.g. "0 0 3 * * *").
    pub cron: Option<String>,
    pub interval_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryConfig {
    pub organization: String,
    pub name: String,
}

impl RepositoryConfig {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.organization, self.name)
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        let mut config: AppConfig = toml::from_str(&s)?;
        if config.github.token.is_empty()
            && let Ok(token) = std::env::var("GITHUB_TOKEN")
        {
            config.github.token = token;
        }
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate config from a string (e.g. for tests). No environment fallback.
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.github.api_url.starts_with("http://") || self.github.api_url.starts_with("https://"),
            "github.api_url must be an http(s) URL, got {:?}",
            self.github.api_url
        );
        anyhow::ensure!(
            !self.github.username.is_empty(),
            "github.username must be non-empty"
        );
        anyhow::ensure!(
            !self.github.token.is_empty(),
            "github.token must be set (or provide GITHUB_TOKEN)"
        );
        anyhow::ensure!(
            self.github.timeout_secs > 0,
            "github.timeout_secs must be > 0, got {}",
            self.github.timeout_secs
        );
        anyhow::ensure!(
            !self.database.path.is_empty(),
            "database.path must be non-empty"
        );
        anyhow::ensure!(
            !self.repositories.is_empty(),
            "repositories must list at least one repository"
        );
        for (i, repo) in self.repositories.iter().enumerate() {
            anyhow::ensure!(
                !repo.organization.is_empty() && !repo.name.is_empty(),
                "repositories[{}] must have a non-empty organization and name",
                i
            );
        }
        if let Some(schedule) = &self.schedule {
            match (&schedule.cron, schedule.interval_secs) {
                (Some(expr), None) => {
                    cron::Schedule::from_str(expr).map_err(|e| {
                        anyhow::anyhow!("schedule.cron is not a valid cron expression: {}", e)
                    })?;
                }
                (None, Some(secs)) => {
                    anyhow::ensure!(
                        secs > 0,
                        "schedule.interval_secs must be > 0, got {}",
                        secs
                    );
                }
                _ => anyhow::bail!("schedule must set exactly one of cron or interval_secs"),
            }
        }
        Ok(())
    }
}
