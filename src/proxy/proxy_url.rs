//! Base/proxied URL pair with the not-already-proxied invariant.

use std::fmt;
use std::sync::Arc;

use url::Url;

use super::{ProxyError, ProxyStrategy};

/// A target URL and its proxy-routed form.
///
/// Construction fails when the strategy recognises the base URL as already
/// proxied: the caller is handing back a routed URL, which is a bug upstream
/// rather than a retryable condition. The base URL can only change through
/// [`ProxyUrl::set_base_url`], which re-runs the same validation.
#[derive(Clone)]
pub struct ProxyUrl {
    base: Url,
    proxied: Url,
    proxy: Arc<dyn ProxyStrategy>,
}

impl ProxyUrl {
    pub fn new(base_url: &str, proxy: Arc<dyn ProxyStrategy>) -> Result<Self, ProxyError> {
        let (base, proxied) = Self::validate(base_url, proxy.as_ref())?;
        Ok(Self {
            base,
            proxied,
            proxy,
        })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn proxied(&self) -> &Url {
        &self.proxied
    }

    pub fn proxy(&self) -> &Arc<dyn ProxyStrategy> {
        &self.proxy
    }

    /// Replace the base URL, re-validating the invariant and recomputing the
    /// proxied form.
    pub fn set_base_url(&mut self, base_url: &str) -> Result<(), ProxyError> {
        let (base, proxied) = Self::validate(base_url, self.proxy.as_ref())?;
        self.base = base;
        self.proxied = proxied;
        Ok(())
    }

    fn validate(base_url: &str, proxy: &dyn ProxyStrategy) -> Result<(Url, Url), ProxyError> {
        if proxy.is_url_proxied(base_url) {
            return Err(ProxyError::AlreadyProxied(base_url.to_string()));
        }
        let base = Url::parse(base_url)?;
        let proxied = proxy.make_proxied_url(&base)?;
        Ok((base, proxied))
    }
}

impl fmt::Debug for ProxyUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyUrl")
            .field("base", &self.base.as_str())
            .field("proxied", &self.proxied.as_str())
            .field("proxy", &self.proxy.name())
            .finish()
    }
}
