//! # reviewscraper
//!
//! Orchestration core for browser-driven review scraping. The engine drives
//! one run per business URL through a fixed state machine while everything
//! site-specific lives behind a provider strategy trait.
//!
//! ## Features
//!
//! - Run state machine with guaranteed rendering-session release
//! - Proxy indirection that keeps the logical URL and the navigated URL paired
//! - Bounded retry around page navigation with a chronological failure history
//! - Fault taxonomy with suppress and continue-execution semantics
//! - Severity-routed structured log events, injected rather than global
//! - Validated review records with a content-derived identity checksum
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use reviewscraper::{
//!     EngineSettings, LogRouter, ProviderRegistry, ScrapeEngine, StdLogBackend,
//! };
//!
//! # fn registry() -> ProviderRegistry { ProviderRegistry::new() }
//! # fn renderer() -> Arc<dyn reviewscraper::Renderer> { unimplemented!() }
//! # async fn run(config: reviewscraper::ScrapeConfig) -> Result<(), Box<dyn std::error::Error>> {
//! let engine = ScrapeEngine::new(
//!     registry(),
//!     renderer(),
//!     LogRouter::new(Arc::new(StdLogBackend)),
//!     EngineSettings::from_env(),
//! );
//! let reviews = engine.run(config).await?;
//! println!("scraped {} reviews", reviews.len());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod fault;
pub mod hold;
pub mod logging;
pub mod providers;
pub mod proxy;
pub mod record;
pub mod retry;
pub mod session;

pub use crate::config::{
    DEFAULT_MAX_RETRIES,
    DEFAULT_NAVIGATION_TIMEOUT,
    DEFAULT_ROCKETSCRAPE_ENDPOINT,
    EngineSettings,
    EngineSettingsBuilder,
    ScrapeConfig,
};

pub use crate::engine::{RunContext, ScrapeEngine};

pub use crate::fault::{FaultKind, ScrapeFault};

pub use crate::hold::{Hold, HoldHandle};

pub use crate::logging::{
    CallScope,
    LogBackend,
    LogEvent,
    LogRouter,
    LogStatus,
    Severity,
    StdLogBackend,
};

pub use crate::providers::{ProviderError, ProviderRegistry, ProviderStrategy};

pub use crate::proxy::{
    Bypass,
    ProxyChoice,
    ProxyError,
    ProxyStrategy,
    ProxyUrl,
    RocketScrape,
    resolve_proxy,
};

pub use crate::record::{
    KeyValueField,
    RecordError,
    Review,
    ReviewContent,
    ReviewData,
    ReviewMetadata,
    ReviewReply,
    Reviewer,
    RuntimeMetadata,
    identity_checksum,
};

pub use crate::retry::{AttemptFailure, RetryExhausted, retry};

pub use crate::session::{
    ElementRef,
    LaunchOptions,
    NavResponse,
    Renderer,
    Session,
    SessionError,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
