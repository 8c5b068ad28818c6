//! Provider strategy interface and registry.
//!
//! Each supported review platform is a value implementing
//! [`ProviderStrategy`], a capability set the engine drives without knowing
//! anything about page structure. Site-specific selector logic lives entirely
//! behind this trait; the engine only sees booleans, URLs, element handles
//! and extracted records.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use thiserror::Error;

use crate::engine::RunContext;
use crate::fault::ScrapeFault;
use crate::proxy::{ProxyChoice, ProxyUrl};
use crate::record::Review;
use crate::session::{ElementRef, Session};

/// Failure raised inside a provider hook. Normalised into a [`ScrapeFault`]
/// at the orchestration boundary.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ProviderError {
    message: String,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Site-specific hooks consumed by the engine's run state machine.
#[async_trait]
pub trait ProviderStrategy: Send + Sync {
    /// Identifier the run payload uses to select this provider.
    fn name(&self) -> &'static str;

    /// Root URL for resolving relative pagination paths.
    fn base_url(&self) -> &str;

    /// Optional pattern the business URL must match.
    fn url_pattern(&self) -> Option<&Regex> {
        None
    }

    /// A provider may pin its proxy choice when the site rejects proxied
    /// traffic, overriding the payload's choice.
    fn preferred_proxy(&self) -> Option<ProxyChoice> {
        None
    }

    /// Page-ready predicate for the business page navigation loop.
    async fn business_page_loaded(&self, session: &dyn Session) -> Result<bool, ProviderError>;

    /// Page-ready predicate for review page navigations.
    async fn review_page_loaded(&self, session: &dyn Session) -> Result<bool, ProviderError>;

    /// Gates the empty-result short-circuit: `false` ends the run with an
    /// empty record set, logged as a success.
    async fn has_reviews(&self, session: &dyn Session) -> Result<bool, ProviderError>;

    /// Ordered review-page URLs. `None` entries are filtered out by the
    /// engine before processing.
    async fn pagination(
        &self,
        session: &dyn Session,
        business_url: &ProxyUrl,
    ) -> Result<Vec<Option<ProxyUrl>>, ProviderError>;

    /// Raw review element handles on the current page.
    async fn reviews_on_page(&self, session: &dyn Session)
        -> Result<Vec<ElementRef>, ProviderError>;

    /// Extract one validated record from an element. Failures here are
    /// isolated per element and never fail the page.
    async fn extract_review(
        &self,
        session: &dyn Session,
        element: &ElementRef,
        ctx: &RunContext,
    ) -> Result<Review, ProviderError>;

    /// Optional business-URL cleanup, run before the session launches. May
    /// re-set the base URL (which re-validates the proxy invariant) or
    /// reject the URL outright.
    fn clean_business_url(&self, url: &mut ProxyUrl) -> Result<(), ScrapeFault> {
        let _ = url;
        Ok(())
    }

    /// Optional popup dismissal, run once after the business page loads.
    /// Orchestrated at nonblocking severity; failures never fail the run.
    async fn dismiss_popups(&self, session: &dyn Session) -> Result<(), ProviderError> {
        let _ = session;
        Ok(())
    }
}

impl std::fmt::Debug for dyn ProviderStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderStrategy")
            .field("name", &self.name())
            .finish()
    }
}

/// Maps payload provider names to registered strategies.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn ProviderStrategy>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Arc<dyn ProviderStrategy>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn with_provider(mut self, provider: Arc<dyn ProviderStrategy>) -> Self {
        self.register(provider);
        self
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn ProviderStrategy>, ScrapeFault> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| ScrapeFault::provider_not_implemented(name))
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }
}
