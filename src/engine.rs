//! Scrape-run orchestration.
//!
//! [`ScrapeEngine`] drives one run through its state machine: validate the
//! business URL, acquire a rendering session, navigate with bounded retry,
//! walk the paginated review pages, and aggregate validated records. Every
//! orchestrated step settles through one explicit wrapper that times the
//! call, emits a structured log event, applies the fault's
//! suppress/continue policy, and releases the session before a fatal fault
//! propagates, so the session is released exactly once on every exit path.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::future::join_all;
use thiserror::Error;
use uuid::Uuid;

use crate::config::{EngineSettings, ScrapeConfig};
use crate::fault::ScrapeFault;
use crate::logging::{CallScope, LogEvent, LogRouter, LogStatus, Severity};
use crate::providers::{ProviderRegistry, ProviderStrategy};
use crate::proxy::{ProxyUrl, resolve_proxy};
use crate::record::Review;
use crate::retry::{AttemptFailure, retry};
use crate::session::{LaunchOptions, Renderer, Session};

/// Identity and payload of one scrape run.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: Uuid,
    pub config: ScrapeConfig,
    /// Unix-millis timestamp of engine entry.
    pub started_millis: i64,
}

impl RunContext {
    pub(crate) fn new(config: ScrapeConfig) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            config,
            started_millis: Utc::now().timestamp_millis(),
        }
    }
}

/// Which page-ready predicate a navigation should use.
#[derive(Debug, Clone, Copy)]
enum PageKind {
    Business,
    Review,
}

/// Failure modes of a single navigation attempt; all of them are retryable.
#[derive(Debug, Error)]
enum OpenPageError {
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error("empty response from page")]
    EmptyResponse,
    #[error("{0} error loading page")]
    TransientStatus(u16),
    #[error("load predicate failed: {0}")]
    Predicate(String),
    #[error("page not loaded according to validation function")]
    NotLoaded,
}

/// The orchestrator. All collaborators are injected at construction.
pub struct ScrapeEngine {
    registry: ProviderRegistry,
    renderer: Arc<dyn Renderer>,
    router: LogRouter,
    settings: EngineSettings,
}

impl ScrapeEngine {
    pub fn new(
        registry: ProviderRegistry,
        renderer: Arc<dyn Renderer>,
        router: LogRouter,
        settings: EngineSettings,
    ) -> Self {
        Self {
            registry,
            renderer,
            router,
            settings,
        }
    }

    /// Execute one run. Returns the aggregated record set; a provider that
    /// reports no content yields `Ok` with an empty set, never an error.
    pub async fn run(&self, config: ScrapeConfig) -> Result<Vec<Review>, ScrapeFault> {
        let run = ScrapeRun {
            engine: self,
            ctx: RunContext::new(config),
            session: None,
            reviews: Vec::new(),
        };
        run.execute().await
    }
}

/// Mutable state of one in-flight run.
struct ScrapeRun<'e> {
    engine: &'e ScrapeEngine,
    ctx: RunContext,
    session: Option<Arc<dyn Session>>,
    reviews: Vec<Review>,
}

impl ScrapeRun<'_> {
    async fn execute(mut self) -> Result<Vec<Review>, ScrapeFault> {
        let started = Instant::now();
        let result = self.scrape().await;
        let settled = self
            .settle(CallScope::Run, Severity::Fatal, started, result)
            .await;
        self.finish(settled)
    }

    /// A suppressed fault is a successful outcome, e.g. a business page
    /// with no reviews; records aggregated before it are still returned.
    fn finish(
        mut self,
        settled: Result<Option<()>, ScrapeFault>,
    ) -> Result<Vec<Review>, ScrapeFault> {
        match settled {
            Ok(_) => Ok(std::mem::take(&mut self.reviews)),
            Err(fault) if fault.suppress => Ok(std::mem::take(&mut self.reviews)),
            Err(fault) => Err(fault),
        }
    }

    async fn scrape(&mut self) -> Result<(), ScrapeFault> {
        let provider = self.engine.registry.resolve(&self.ctx.config.provider)?;
        let choice = provider.preferred_proxy().unwrap_or(self.ctx.config.proxy);
        let proxy = resolve_proxy(choice, &self.engine.settings)?;

        let mut business_url = ProxyUrl::new(&self.ctx.config.business_url, Arc::clone(&proxy))?;
        if let Some(pattern) = provider.url_pattern()
            && !pattern.is_match(business_url.base().as_str())
        {
            return Err(ScrapeFault::invalid_business_url(business_url.base()));
        }
        provider.clean_business_url(&mut business_url)?;

        let session = self
            .engine
            .renderer
            .launch(LaunchOptions {
                ignore_https_errors: proxy.ignore_https_errors(),
                user_agent: self.engine.settings.user_agent.clone(),
            })
            .await?;
        self.session = Some(Arc::clone(&session));

        self.open_page(
            session.as_ref(),
            provider.as_ref(),
            &business_url,
            PageKind::Business,
        )
        .await?;

        // Popup dismissal must never fail a run.
        {
            let started = Instant::now();
            let result = provider
                .dismiss_popups(session.as_ref())
                .await
                .map_err(|err| ScrapeFault::from(err).with_continue(true));
            self.settle(CallScope::Run, Severity::Nonblocking, started, result)
                .await?;
        }

        if !provider.has_reviews(session.as_ref()).await? {
            return Err(ScrapeFault::no_reviews(business_url.base()));
        }

        let pages: Vec<ProxyUrl> = provider
            .pagination(session.as_ref(), &business_url)
            .await?
            .into_iter()
            .flatten()
            .collect();
        if pages.is_empty() {
            return Err(ScrapeFault::unexpected(
                "there are no review pages to scrape",
            ));
        }

        for page_url in &pages {
            let started = Instant::now();
            // Page faults are downgraded to continue-execution by policy:
            // one bad page never sinks the run.
            let result = self
                .process_page(provider.as_ref(), &session, page_url)
                .await
                .map_err(|fault| fault.with_continue(true));
            self.settle(CallScope::Page, Severity::Critical, started, result)
                .await?;
        }

        self.release_session().await;
        Ok(())
    }

    /// Navigate to one review page and extract its records, isolating
    /// per-element failures from each other.
    async fn process_page(
        &mut self,
        provider: &dyn ProviderStrategy,
        session: &Arc<dyn Session>,
        page_url: &ProxyUrl,
    ) -> Result<(), ScrapeFault> {
        self.open_page(session.as_ref(), provider, page_url, PageKind::Review)
            .await?;
        let elements = provider.reviews_on_page(session.as_ref()).await?;

        let ctx = &self.ctx;
        let extractions = elements.iter().map(|element| {
            let session = Arc::clone(session);
            async move {
                let started = Instant::now();
                let result = provider
                    .extract_review(session.as_ref(), element, ctx)
                    .await;
                (result, started.elapsed())
            }
        });
        let outcomes = join_all(extractions).await;

        for (result, elapsed) in outcomes {
            let settled = result.map_err(ScrapeFault::from).and_then(|review| {
                review.validate().map_err(ScrapeFault::unexpected)?;
                Ok(review)
            });
            match settled {
                Ok(review) => self.reviews.push(review),
                Err(fault) => self.emit(
                    CallScope::Review,
                    Severity::Critical,
                    LogStatus::Failure,
                    fault.message.clone(),
                    elapsed,
                    &fault.retry_history,
                ),
            }
        }

        Ok(())
    }

    /// Retry-wrapped navigation; exhaustion surfaces as a `GetPage` fault
    /// carrying the chronological failure history.
    async fn open_page(
        &self,
        session: &dyn Session,
        provider: &dyn ProviderStrategy,
        url: &ProxyUrl,
        kind: PageKind,
    ) -> Result<(), ScrapeFault> {
        retry(
            || self.try_open(session, provider, url, kind),
            self.engine.settings.max_retries,
        )
        .await
        .map_err(|exhausted| {
            ScrapeFault::get_page("maximum retries reached opening page", exhausted.history)
        })
    }

    async fn try_open(
        &self,
        session: &dyn Session,
        provider: &dyn ProviderStrategy,
        url: &ProxyUrl,
        kind: PageKind,
    ) -> Result<(), OpenPageError> {
        let response = session
            .goto(url.proxied(), self.engine.settings.navigation_timeout)
            .await
            .map_err(|err| OpenPageError::Navigation(err.to_string()))?;
        let Some(response) = response else {
            return Err(OpenPageError::EmptyResponse);
        };
        // 429 is the forwarding proxy's concurrency-limit status.
        if matches!(response.status, 429 | 500) {
            return Err(OpenPageError::TransientStatus(response.status));
        }

        let loaded = match kind {
            PageKind::Business => provider.business_page_loaded(session).await,
            PageKind::Review => provider.review_page_loaded(session).await,
        }
        .map_err(|err| OpenPageError::Predicate(err.to_string()))?;
        if !loaded {
            return Err(OpenPageError::NotLoaded);
        }
        Ok(())
    }

    /// Settle one orchestrated call: emit its log event, swallow
    /// continue-execution faults, release the session before a fatal fault
    /// propagates. Suppressed faults are logged as successes.
    async fn settle<T>(
        &mut self,
        scope: CallScope,
        severity: Severity,
        started: Instant,
        result: Result<T, ScrapeFault>,
    ) -> Result<Option<T>, ScrapeFault> {
        let execution_time = started.elapsed();
        match result {
            Ok(value) => {
                self.emit(
                    scope,
                    severity,
                    LogStatus::Success,
                    format!("success on {scope}"),
                    execution_time,
                    &[],
                );
                Ok(Some(value))
            }
            Err(fault) => {
                let status = if fault.suppress {
                    LogStatus::Success
                } else {
                    LogStatus::Failure
                };
                self.emit(
                    scope,
                    severity,
                    status,
                    fault.message.clone(),
                    execution_time,
                    &fault.retry_history,
                );
                if fault.continue_execution {
                    Ok(None)
                } else {
                    self.release_session().await;
                    Err(fault)
                }
            }
        }
    }

    fn emit(
        &self,
        scope: CallScope,
        severity: Severity,
        status: LogStatus,
        message: String,
        execution_time: Duration,
        retry_history: &[AttemptFailure],
    ) {
        self.engine.router.emit(LogEvent {
            run_id: self.ctx.run_id,
            scope,
            severity,
            status,
            message,
            execution_time,
            details: self.ctx.config.clone(),
            retry_history: retry_history.to_vec(),
            timestamp: Utc::now(),
        });
    }

    /// Idempotent: the slot is emptied on first release.
    async fn release_session(&mut self) {
        if let Some(session) = self.session.take()
            && let Err(err) = session.close().await
        {
            log::warn!("failed to close rendering session: {err}");
        }
    }
}
