use std::env;
use std::path::PathBuf;

use chrono::Duration;
use tracing::info;

use crate::error::GpwError;

/// Desktop Chrome user agent presented by every scraping page. The site
/// serves a reduced layout to unknown agents.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const DEFAULT_DATABASE_URL: &str = "sqlite://data/gpw_data.sqlite";
const DEFAULT_URLS_FILE: &str = "data/company_urls.csv";
const DEFAULT_FRESHNESS_HOURS: i64 = 24;

/// Scraper configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Storage
    pub database_url: String,
    pub urls_file: PathBuf,

    // Scheduling
    pub concurrency_limit: usize,
    pub freshness_window: Duration,

    // Browser
    pub browser_ws_url: Option<String>,
    pub browser_token: Option<String>,
    pub chrome_bin: Option<PathBuf>,
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            urls_file: PathBuf::from(DEFAULT_URLS_FILE),
            concurrency_limit: 1,
            freshness_window: Duration::hours(DEFAULT_FRESHNESS_HOURS),
            browser_ws_url: None,
            browser_token: None,
            chrome_bin: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, GpwError> {
        let defaults = Self::default();
        let config = Self {
            database_url: env::var("GPW_DATABASE_URL").unwrap_or(defaults.database_url),
            urls_file: env::var("GPW_URLS_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.urls_file),
            concurrency_limit: match optional_env("GPW_CONCURRENCY") {
                Some(raw) => parse_number("GPW_CONCURRENCY", &raw)?,
                None => defaults.concurrency_limit,
            },
            freshness_window: match optional_env("GPW_FRESHNESS_HOURS") {
                Some(raw) => Duration::hours(parse_number("GPW_FRESHNESS_HOURS", &raw)?),
                None => defaults.freshness_window,
            },
            browser_ws_url: optional_env("BROWSERLESS_WS_URL"),
            browser_token: optional_env("BROWSERLESS_TOKEN"),
            chrome_bin: optional_env("CHROME_BIN").map(PathBuf::from),
            user_agent: optional_env("GPW_USER_AGENT").unwrap_or(defaults.user_agent),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), GpwError> {
        if self.concurrency_limit < 1 {
            return Err(GpwError::Config(
                "concurrency limit must be at least 1".to_string(),
            ));
        }
        if self.freshness_window < Duration::zero() {
            return Err(GpwError::Config(
                "freshness window must not be negative".to_string(),
            ));
        }
        Ok(())
    }

    /// Log the effective configuration with the browser token masked.
    pub fn log_redacted(&self) {
        info!(
            database_url = self.database_url.as_str(),
            urls_file = %self.urls_file.display(),
            concurrency_limit = self.concurrency_limit,
            freshness_hours = self.freshness_window.num_hours(),
            browser = self.browser_ws_url.as_deref().unwrap_or("local chromium"),
            browser_token = if self.browser_token.is_some() { "[set]" } else { "[unset]" },
            "Loaded config"
        );
    }
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, GpwError> {
    raw.trim()
        .parse()
        .map_err(|_| GpwError::Config(format!("{key} must be a number, got {raw:?}")))
}
