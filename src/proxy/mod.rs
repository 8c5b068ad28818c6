//! Proxy-URL indirection layer.
//!
//! A [`ProxyStrategy`] rewrites a target URL through a forwarding service and
//! knows how to recognise URLs it has already rewritten. [`ProxyUrl`] pairs a
//! base URL with its proxied form and refuses to hold a base URL that is
//! already proxy-routed, which would signal a bug upstream.

mod bypass;
mod proxy_url;
mod rocket_scrape;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::config::EngineSettings;

pub use bypass::Bypass;
pub use proxy_url::ProxyUrl;
pub use rocket_scrape::RocketScrape;

/// Recognised proxy identifiers, as they appear in the run payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProxyChoice {
    #[serde(rename = "RocketScrape")]
    RocketScrape,
    #[serde(rename = "No proxy")]
    NoProxy,
}

impl fmt::Display for ProxyChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyChoice::RocketScrape => write!(f, "RocketScrape"),
            ProxyChoice::NoProxy => write!(f, "No proxy"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("{0} is already routed through the proxy")]
    AlreadyProxied(String),
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
    #[error("RocketScrape api key is not configured")]
    MissingApiKey,
}

/// Polymorphic proxy capability.
pub trait ProxyStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the rendering session should ignore HTTPS errors. Remote
    /// forwarding proxies terminate TLS themselves, so traffic tunnelled
    /// through them fails certificate validation.
    fn ignore_https_errors(&self) -> bool;

    /// True when the URL already carries this strategy's routing markers.
    fn is_url_proxied(&self, url: &str) -> bool;

    fn make_proxied_url(&self, url: &Url) -> Result<Url, ProxyError>;
}

impl fmt::Debug for dyn ProxyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyStrategy")
            .field("name", &self.name())
            .finish()
    }
}

/// Resolve a payload identifier into a concrete strategy.
pub fn resolve_proxy(
    choice: ProxyChoice,
    settings: &EngineSettings,
) -> Result<Arc<dyn ProxyStrategy>, ProxyError> {
    match choice {
        ProxyChoice::RocketScrape => Ok(Arc::new(RocketScrape::from_settings(settings)?)),
        ProxyChoice::NoProxy => Ok(Arc::new(Bypass)),
    }
}
