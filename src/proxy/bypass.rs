//! Identity proxy strategy for direct connections.

use url::Url;

use super::{ProxyError, ProxyStrategy};

/// No-op strategy: the proxied URL is the base URL.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bypass;

impl ProxyStrategy for Bypass {
    fn name(&self) -> &'static str {
        "No proxy"
    }

    fn ignore_https_errors(&self) -> bool {
        false
    }

    fn is_url_proxied(&self, _url: &str) -> bool {
        false
    }

    fn make_proxied_url(&self, url: &Url) -> Result<Url, ProxyError> {
        Ok(url.clone())
    }
}
