//! End-to-end runs of the engine state machine against scripted fakes.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use url::Url;

use reviewscraper::{
    CallScope, ElementRef, EngineSettings, FaultKind, KeyValueField, LaunchOptions, LogBackend,
    LogEvent, LogRouter, LogStatus, NavResponse, ProviderError, ProviderRegistry,
    ProviderStrategy, ProxyChoice, ProxyUrl, Renderer, Review, ReviewContent, ReviewData,
    ReviewMetadata, ReviewReply, Reviewer, RunContext, ScrapeConfig, ScrapeEngine, ScrapeFault,
    Session, SessionError, identity_checksum,
};

/// Scripted outcome for one navigation.
#[derive(Debug, Clone)]
enum Nav {
    Status(u16),
    Empty,
    Fail,
}

/// Session whose navigations follow a per-URL script. The last entry of a
/// script is sticky; unscripted URLs navigate with status 200.
#[derive(Default)]
struct FakeSession {
    script: Mutex<HashMap<String, VecDeque<Nav>>>,
    visited: Mutex<Vec<String>>,
    gotos: AtomicUsize,
    closes: AtomicUsize,
}

impl FakeSession {
    fn script_url(&self, url: &str, outcomes: Vec<Nav>) {
        self.script
            .lock()
            .unwrap()
            .insert(url.to_string(), outcomes.into());
    }

    fn next_outcome(&self, url: &str) -> Nav {
        let mut script = self.script.lock().unwrap();
        match script.get_mut(url) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or(Nav::Status(200)),
            Some(queue) => queue.front().cloned().unwrap_or(Nav::Status(200)),
            None => Nav::Status(200),
        }
    }
}

#[async_trait]
impl Session for FakeSession {
    async fn goto(
        &self,
        url: &Url,
        _timeout: Duration,
    ) -> Result<Option<NavResponse>, SessionError> {
        self.gotos.fetch_add(1, Ordering::SeqCst);
        self.visited.lock().unwrap().push(url.to_string());
        match self.next_outcome(url.as_str()) {
            Nav::Status(status) => Ok(Some(NavResponse { status })),
            Nav::Empty => Ok(None),
            Nav::Fail => Err(SessionError::Backend("socket hang up".into())),
        }
    }

    async fn close(&self) -> Result<(), SessionError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FakeRenderer {
    session: Arc<FakeSession>,
    launches: AtomicUsize,
    last_options: Mutex<Option<LaunchOptions>>,
}

#[async_trait]
impl Renderer for FakeRenderer {
    async fn launch(&self, options: LaunchOptions) -> Result<Arc<dyn Session>, SessionError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        *self.last_options.lock().unwrap() = Some(options);
        let session: Arc<dyn Session> = self.session.clone();
        Ok(session)
    }
}

/// Provider with configurable pagination, element count and one optionally
/// failing element per page.
struct FakeProvider {
    has_reviews: bool,
    pages: Vec<Option<String>>,
    elements_per_page: usize,
    failing_element: Option<usize>,
    pattern: Option<Regex>,
    pinned_proxy: Option<ProxyChoice>,
    strip_trailing_slash: bool,
    fail_popups: bool,
}

impl Default for FakeProvider {
    fn default() -> Self {
        Self {
            has_reviews: true,
            pages: vec![Some("https://example.com/business/reviews/page-1".into())],
            elements_per_page: 3,
            failing_element: None,
            pattern: None,
            pinned_proxy: None,
            strip_trailing_slash: false,
            fail_popups: false,
        }
    }
}

#[async_trait]
impl ProviderStrategy for FakeProvider {
    fn name(&self) -> &'static str {
        "Fake"
    }

    fn base_url(&self) -> &str {
        "https://example.com"
    }

    fn url_pattern(&self) -> Option<&Regex> {
        self.pattern.as_ref()
    }

    fn preferred_proxy(&self) -> Option<ProxyChoice> {
        self.pinned_proxy
    }

    fn clean_business_url(&self, url: &mut ProxyUrl) -> Result<(), ScrapeFault> {
        if self.strip_trailing_slash
            && let Some(stripped) = url.base().as_str().strip_suffix('/')
        {
            let cleaned = stripped.to_string();
            url.set_base_url(&cleaned)
                .map_err(ScrapeFault::unexpected)?;
        }
        Ok(())
    }

    async fn dismiss_popups(&self, _session: &dyn Session) -> Result<(), ProviderError> {
        if self.fail_popups {
            return Err(ProviderError::new("cookie banner would not close"));
        }
        Ok(())
    }

    async fn business_page_loaded(&self, _session: &dyn Session) -> Result<bool, ProviderError> {
        Ok(true)
    }

    async fn review_page_loaded(&self, _session: &dyn Session) -> Result<bool, ProviderError> {
        Ok(true)
    }

    async fn has_reviews(&self, _session: &dyn Session) -> Result<bool, ProviderError> {
        Ok(self.has_reviews)
    }

    async fn pagination(
        &self,
        _session: &dyn Session,
        business_url: &ProxyUrl,
    ) -> Result<Vec<Option<ProxyUrl>>, ProviderError> {
        self.pages
            .iter()
            .map(|page| {
                page.as_deref()
                    .map(|raw| {
                        ProxyUrl::new(raw, Arc::clone(business_url.proxy()))
                            .map_err(|err| ProviderError::new(err.to_string()))
                    })
                    .transpose()
            })
            .collect()
    }

    async fn reviews_on_page(
        &self,
        _session: &dyn Session,
    ) -> Result<Vec<ElementRef>, ProviderError> {
        Ok((0..self.elements_per_page)
            .map(|i| ElementRef::new(format!("el-{i}")))
            .collect())
    }

    async fn extract_review(
        &self,
        _session: &dyn Session,
        element: &ElementRef,
        ctx: &RunContext,
    ) -> Result<Review, ProviderError> {
        let index: usize = element
            .remote_id
            .strip_prefix("el-")
            .and_then(|raw| raw.parse().ok())
            .ok_or_else(|| ProviderError::new("unknown element handle"))?;
        if self.failing_element == Some(index) {
            return Err(ProviderError::new("review card missing its text node"));
        }

        let name = format!("Reviewer {index}");
        let posted = 1_690_000_000_000 + index as i64;
        let data = ReviewData {
            reviewer: Reviewer {
                name: name.clone(),
                verified: true,
            },
            content: ReviewContent {
                original_text: format!("Review text {index}"),
                stars: 4.0,
                seen_for: vec!["checkup".into()],
                posted_unix_millis: posted,
                tags: vec![KeyValueField {
                    key: "punctuality".into(),
                    value: 5.0,
                }],
            },
            reply: ReviewReply {
                has_reply: false,
                text: None,
            },
            metadata: ReviewMetadata {
                provider: self.name().into(),
                base_url: ctx.config.business_url.clone(),
                proxied_url: ctx.config.business_url.clone(),
            },
            business_id: ctx.config.business_url.clone(),
            checksum: identity_checksum(&name, posted),
        };
        Review::from_extraction(ctx, data).map_err(|err| ProviderError::new(err.to_string()))
    }
}

#[derive(Default)]
struct CollectingBackend {
    events: Mutex<Vec<(&'static str, LogEvent)>>,
}

impl CollectingBackend {
    fn on_channel(&self, channel: &str) -> Vec<LogEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| *c == channel)
            .map(|(_, e)| e.clone())
            .collect()
    }
}

impl LogBackend for CollectingBackend {
    fn fatal(&self, event: &LogEvent) {
        self.events.lock().unwrap().push(("fatal", event.clone()));
    }
    fn error(&self, event: &LogEvent) {
        self.events.lock().unwrap().push(("error", event.clone()));
    }
    fn warn(&self, event: &LogEvent) {
        self.events.lock().unwrap().push(("warn", event.clone()));
    }
    fn info(&self, event: &LogEvent) {
        self.events.lock().unwrap().push(("info", event.clone()));
    }
    fn debug(&self, event: &LogEvent) {
        self.events.lock().unwrap().push(("debug", event.clone()));
    }
}

struct Harness {
    engine: ScrapeEngine,
    backend: Arc<CollectingBackend>,
    renderer: Arc<FakeRenderer>,
    session: Arc<FakeSession>,
}

fn harness(provider: Option<FakeProvider>, settings: EngineSettings) -> Harness {
    let session = Arc::new(FakeSession::default());
    let renderer = Arc::new(FakeRenderer {
        session: Arc::clone(&session),
        launches: AtomicUsize::new(0),
        last_options: Mutex::new(None),
    });
    let backend = Arc::new(CollectingBackend::default());
    let mut registry = ProviderRegistry::new();
    if let Some(provider) = provider {
        registry.register(Arc::new(provider));
    }
    let engine = ScrapeEngine::new(
        registry,
        Arc::clone(&renderer) as Arc<dyn Renderer>,
        LogRouter::new(Arc::clone(&backend) as Arc<dyn LogBackend>),
        settings,
    );
    Harness {
        engine,
        backend,
        renderer,
        session,
    }
}

fn config() -> ScrapeConfig {
    ScrapeConfig {
        provider: "Fake".into(),
        business_url: "https://example.com/business".into(),
        proxy: ProxyChoice::NoProxy,
        mode: "full".into(),
        return_reviews: true,
        persist_reviews: false,
        added_to_queue_millis: None,
    }
}

fn small_budget() -> EngineSettings {
    EngineSettings::builder().with_max_retries(3).build()
}

#[tokio::test]
async fn unknown_provider_fails_before_any_navigation() {
    let h = harness(None, small_budget());
    let fault = h.engine.run(config()).await.unwrap_err();

    assert_eq!(fault.kind, FaultKind::ProviderNotImplemented);
    assert_eq!(fault.status_code, 501);
    assert_eq!(h.renderer.launches.load(Ordering::SeqCst), 0);
    assert_eq!(h.session.closes.load(Ordering::SeqCst), 0);

    let fatal = h.backend.on_channel("fatal");
    assert_eq!(fatal.len(), 1);
    assert_eq!(fatal[0].scope, CallScope::Run);
    assert_eq!(fatal[0].status, LogStatus::Failure);
}

#[tokio::test]
async fn business_url_rejected_by_provider_pattern() {
    let provider = FakeProvider {
        pattern: Some(Regex::new(r"^https://example\.com/business/.+$").unwrap()),
        ..FakeProvider::default()
    };
    let h = harness(Some(provider), small_budget());
    let fault = h.engine.run(config()).await.unwrap_err();

    assert_eq!(fault.kind, FaultKind::InvalidBusinessUrl);
    assert_eq!(fault.status_code, 400);
    assert_eq!(h.renderer.launches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn already_proxied_business_url_is_rejected_before_launch() {
    let h = harness(
        Some(FakeProvider::default()),
        EngineSettings::builder()
            .with_max_retries(3)
            .with_rocketscrape_api_key("secret")
            .build(),
    );
    let mut cfg = config();
    cfg.proxy = ProxyChoice::RocketScrape;
    cfg.business_url =
        "https://api.rocketscrape.com/?apiKey=secret&url=https%3A%2F%2Fexample.com".into();

    let fault = h.engine.run(cfg).await.unwrap_err();
    assert_eq!(fault.kind, FaultKind::Unexpected);
    assert!(fault.message.contains("already routed"));
    assert_eq!(h.renderer.launches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn no_reviews_is_a_successful_empty_run() {
    let provider = FakeProvider {
        has_reviews: false,
        ..FakeProvider::default()
    };
    let h = harness(Some(provider), small_budget());
    let reviews = h.engine.run(config()).await.unwrap();

    assert!(reviews.is_empty());
    assert_eq!(h.session.closes.load(Ordering::SeqCst), 1);
    // The terminal run event is logged as a success, never as a failure.
    assert!(h.backend.on_channel("fatal").is_empty());
    let info = h.backend.on_channel("info");
    let terminal = info
        .iter()
        .find(|e| e.scope == CallScope::Run && e.message.contains("has no reviews"))
        .unwrap();
    assert_eq!(terminal.status, LogStatus::Success);
}

#[tokio::test]
async fn provider_hooks_shape_the_run_without_failing_it() {
    let provider = FakeProvider {
        pinned_proxy: Some(ProxyChoice::NoProxy),
        strip_trailing_slash: true,
        fail_popups: true,
        ..FakeProvider::default()
    };
    // No RocketScrape key is configured, so the run only resolves a proxy
    // at all because the provider's pin overrides the payload's choice.
    let h = harness(Some(provider), small_budget());
    let mut cfg = config();
    cfg.proxy = ProxyChoice::RocketScrape;
    cfg.business_url = "https://example.com/business/".into();

    let reviews = h.engine.run(cfg).await.unwrap();
    assert_eq!(reviews.len(), 3);

    // The pinned strategy's TLS policy reaches the renderer.
    let options = h.renderer.last_options.lock().unwrap().clone().unwrap();
    assert!(!options.ignore_https_errors);

    // Navigation used the cleaned business URL, trailing slash gone.
    let visited = h.session.visited.lock().unwrap().clone();
    assert_eq!(visited[0], "https://example.com/business");

    // The popup failure is logged at nonblocking severity and swallowed.
    let warns = h.backend.on_channel("warn");
    assert_eq!(warns.len(), 1);
    assert_eq!(warns[0].scope, CallScope::Run);
    assert_eq!(warns[0].status, LogStatus::Failure);
    assert!(h.backend.on_channel("fatal").is_empty());
}

#[tokio::test]
async fn full_run_aggregates_across_pages_and_isolates_bad_elements() {
    let provider = FakeProvider {
        pages: vec![
            Some("https://example.com/business/reviews/page-1".into()),
            Some("https://example.com/business/reviews/page-2".into()),
        ],
        elements_per_page: 3,
        failing_element: Some(0),
        ..FakeProvider::default()
    };
    let h = harness(Some(provider), small_budget());
    let reviews = h.engine.run(config()).await.unwrap();

    // 2 pages x 3 elements, one failing extraction per page.
    assert_eq!(reviews.len(), 4);
    let run_id = reviews[0].runtime.run_id;
    assert!(reviews.iter().all(|r| r.runtime.run_id == run_id));
    assert!(reviews.iter().all(|r| r.runtime.mode == "full"));
    assert!(reviews.iter().all(|r| !r.checksum.is_empty()));

    // Element failures surface as review-scope events without failing the page.
    let element_failures: Vec<_> = h
        .backend
        .on_channel("error")
        .into_iter()
        .filter(|e| e.scope == CallScope::Review)
        .collect();
    assert_eq!(element_failures.len(), 2);

    assert_eq!(h.session.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn one_failing_extraction_leaves_siblings_untouched() {
    let provider = FakeProvider {
        elements_per_page: 4,
        failing_element: Some(1),
        ..FakeProvider::default()
    };
    let h = harness(Some(provider), small_budget());
    let reviews = h.engine.run(config()).await.unwrap();

    assert_eq!(reviews.len(), 3);
    let names: Vec<&str> = reviews.iter().map(|r| r.reviewer.name.as_str()).collect();
    assert!(!names.contains(&"Reviewer 1"));
}

#[tokio::test]
async fn none_pagination_entries_are_skipped() {
    let provider = FakeProvider {
        pages: vec![
            None,
            Some("https://example.com/business/reviews/page-1".into()),
        ],
        elements_per_page: 2,
        ..FakeProvider::default()
    };
    let h = harness(Some(provider), small_budget());
    let reviews = h.engine.run(config()).await.unwrap();
    assert_eq!(reviews.len(), 2);
}

#[tokio::test]
async fn empty_pagination_fails_the_run() {
    let provider = FakeProvider {
        pages: Vec::new(),
        ..FakeProvider::default()
    };
    let h = harness(Some(provider), small_budget());
    let fault = h.engine.run(config()).await.unwrap_err();

    assert_eq!(fault.kind, FaultKind::Unexpected);
    assert!(fault.message.contains("no review pages"));
    assert_eq!(h.session.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn exhausted_navigation_reports_full_retry_history() {
    let h = harness(Some(FakeProvider::default()), small_budget());
    h.session
        .script_url("https://example.com/business", vec![Nav::Status(429)]);

    let fault = h.engine.run(config()).await.unwrap_err();
    assert_eq!(fault.kind, FaultKind::GetPage);
    assert_eq!(fault.status_code, 501);
    assert_eq!(fault.retry_history.len(), 3);
    assert!(fault.retry_history[0].message.contains("429"));
    let attempts: Vec<usize> = fault.retry_history.iter().map(|f| f.attempt).collect();
    assert_eq!(attempts, vec![1, 2, 3]);

    // Session released exactly once even on the fatal path.
    assert_eq!(h.session.closes.load(Ordering::SeqCst), 1);
    let fatal = h.backend.on_channel("fatal");
    assert_eq!(fatal.len(), 1);
    assert_eq!(fatal[0].retry_history.len(), 3);
}

#[tokio::test]
async fn transient_navigation_failures_recover_within_budget() {
    let h = harness(Some(FakeProvider::default()), small_budget());
    h.session.script_url(
        "https://example.com/business",
        vec![Nav::Fail, Nav::Status(500), Nav::Empty, Nav::Status(200)],
    );

    let reviews = h.engine.run(config()).await.unwrap();
    assert_eq!(reviews.len(), 3);
    assert!(h.backend.on_channel("fatal").is_empty());
}

#[tokio::test]
async fn one_failing_page_does_not_sink_the_run() {
    let provider = FakeProvider {
        pages: vec![
            Some("https://example.com/business/reviews/page-1".into()),
            Some("https://example.com/business/reviews/page-2".into()),
        ],
        elements_per_page: 2,
        ..FakeProvider::default()
    };
    let h = harness(Some(provider), small_budget());
    h.session.script_url(
        "https://example.com/business/reviews/page-1",
        vec![Nav::Status(429)],
    );

    let reviews = h.engine.run(config()).await.unwrap();
    // Page 1 exhausts its retries; page 2 still contributes its records.
    assert_eq!(reviews.len(), 2);

    let page_failures: Vec<_> = h
        .backend
        .on_channel("error")
        .into_iter()
        .filter(|e| e.scope == CallScope::Page)
        .collect();
    assert_eq!(page_failures.len(), 1);
    assert_eq!(page_failures[0].retry_history.len(), 3);

    // The run itself still settles as a success.
    assert!(h.backend.on_channel("fatal").is_empty());
    assert_eq!(h.session.closes.load(Ordering::SeqCst), 1);
}
