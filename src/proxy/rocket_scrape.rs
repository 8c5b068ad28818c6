//! RocketScrape forwarding proxy strategy.
//!
//! Wraps the target URL as a query parameter of the RocketScrape API
//! endpoint. A URL counts as already proxied when it carries both the
//! `apiKey` and `url` parameters, regardless of any other parameters.

use url::Url;

use crate::config::EngineSettings;

use super::{ProxyError, ProxyStrategy};

const ROUTING_PARAMS: [&str; 2] = ["apiKey", "url"];

pub struct RocketScrape {
    endpoint: Url,
    api_key: String,
}

impl RocketScrape {
    pub fn new(endpoint: Url, api_key: impl Into<String>) -> Self {
        Self {
            endpoint,
            api_key: api_key.into(),
        }
    }

    /// Build from deployment settings; fails when no API key was configured.
    pub fn from_settings(settings: &EngineSettings) -> Result<Self, ProxyError> {
        let api_key = settings
            .rocketscrape_api_key
            .clone()
            .ok_or(ProxyError::MissingApiKey)?;
        let endpoint = Url::parse(&settings.rocketscrape_endpoint)?;
        Ok(Self::new(endpoint, api_key))
    }
}

impl ProxyStrategy for RocketScrape {
    fn name(&self) -> &'static str {
        "RocketScrape"
    }

    // TLS terminates at the remote proxy, not at the target origin.
    fn ignore_https_errors(&self) -> bool {
        true
    }

    fn is_url_proxied(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        ROUTING_PARAMS
            .iter()
            .all(|param| parsed.query_pairs().any(|(key, _)| key == *param))
    }

    fn make_proxied_url(&self, url: &Url) -> Result<Url, ProxyError> {
        let mut proxied = self.endpoint.clone();
        proxied
            .query_pairs_mut()
            .append_pair("apiKey", &self.api_key)
            .append_pair("render", "false")
            .append_pair("url", url.as_str());
        Ok(proxied)
    }
}
