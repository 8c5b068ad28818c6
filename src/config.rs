//! Run payload and deployment settings.
//!
//! [`ScrapeConfig`] is the per-run payload handed in by the ingress layer.
//! [`EngineSettings`] is deployment configuration resolved once at process
//! start, either through the builder or [`EngineSettings::from_env`], and
//! passed down explicitly; nothing in the crate reads the environment ad hoc.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::proxy::ProxyChoice;

pub const DEFAULT_MAX_RETRIES: usize = 50;
pub const DEFAULT_NAVIGATION_TIMEOUT: Duration = Duration::from_millis(15_000);
pub const DEFAULT_ROCKETSCRAPE_ENDPOINT: &str = "https://api.rocketscrape.com/";
const DEFAULT_USER_AGENT: &str = concat!("reviewscraper/", env!("CARGO_PKG_VERSION"));

/// One run's configuration, as received from the ingress layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeConfig {
    pub provider: String,
    #[serde(rename = "businessURL")]
    pub business_url: String,
    pub proxy: ProxyChoice,
    pub mode: String,
    #[serde(rename = "returnReviews")]
    pub return_reviews: bool,
    #[serde(rename = "persistReviews")]
    pub persist_reviews: bool,
    #[serde(rename = "addedToQueueMillis", default)]
    pub added_to_queue_millis: Option<i64>,
}

/// Deployment-level engine configuration.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Retry budget for the navigation loop.
    pub max_retries: usize,
    /// Per-attempt navigation timeout.
    pub navigation_timeout: Duration,
    /// User agent handed to the rendering session.
    pub user_agent: String,
    pub rocketscrape_endpoint: String,
    pub rocketscrape_api_key: Option<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            navigation_timeout: DEFAULT_NAVIGATION_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            rocketscrape_endpoint: DEFAULT_ROCKETSCRAPE_ENDPOINT.to_string(),
            rocketscrape_api_key: None,
        }
    }
}

impl EngineSettings {
    pub fn builder() -> EngineSettingsBuilder {
        EngineSettingsBuilder::new()
    }

    /// Resolve settings from the environment in one place, at process start.
    ///
    /// Recognised variables: `MAX_RETRIES`, `CUSTOM_USER_AGENT`,
    /// `ROCKET_SCRAPE_API_KEY`. Unset or unparsable values fall back to the
    /// defaults.
    pub fn from_env() -> Self {
        let mut builder = Self::builder();
        if let Ok(raw) = std::env::var("MAX_RETRIES")
            && let Ok(value) = raw.parse()
        {
            builder = builder.with_max_retries(value);
        }
        if let Ok(agent) = std::env::var("CUSTOM_USER_AGENT") {
            builder = builder.with_user_agent(agent);
        }
        if let Ok(key) = std::env::var("ROCKET_SCRAPE_API_KEY") {
            builder = builder.with_rocketscrape_api_key(key);
        }
        builder.build()
    }
}

/// Fluent builder for [`EngineSettings`].
#[derive(Debug, Default)]
pub struct EngineSettingsBuilder {
    settings: EngineSettings,
}

impl EngineSettingsBuilder {
    pub fn new() -> Self {
        Self {
            settings: EngineSettings::default(),
        }
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.settings.max_retries = max_retries;
        self
    }

    pub fn with_navigation_timeout(mut self, timeout: Duration) -> Self {
        self.settings.navigation_timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.settings.user_agent = user_agent.into();
        self
    }

    pub fn with_rocketscrape_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.settings.rocketscrape_endpoint = endpoint.into();
        self
    }

    pub fn with_rocketscrape_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.settings.rocketscrape_api_key = Some(api_key.into());
        self
    }

    pub fn build(self) -> EngineSettings {
        self.settings
    }
}
