//! Severity-routed log events for orchestrated calls.
//!
//! Every orchestrated call produces one [`LogEvent`]: write-once,
//! fire-and-forget. The [`LogRouter`] decides which [`LogBackend`] channel
//! receives it: successes always land on the informational channel, failures
//! route by severity. The backend is injected at engine construction; there
//! is no global logger lookup.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::ScrapeConfig;
use crate::retry::AttemptFailure;

/// Severity attached to an orchestrated call, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Fatal,
    Critical,
    Nonblocking,
    Info,
    Debug,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStatus {
    Success,
    Failure,
}

/// Which orchestration scope emitted the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallScope {
    Run,
    Page,
    Review,
}

impl fmt::Display for CallScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallScope::Run => write!(f, "run"),
            CallScope::Page => write!(f, "page"),
            CallScope::Review => write!(f, "review"),
        }
    }
}

/// Structured event describing one orchestrated call's outcome.
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub run_id: Uuid,
    pub scope: CallScope,
    pub severity: Severity,
    pub status: LogStatus,
    pub message: String,
    /// Wall-clock time between call entry and settlement.
    pub execution_time: Duration,
    /// Originating run configuration.
    pub details: ScrapeConfig,
    /// Navigation failure history, present on retry-exhausted failures.
    pub retry_history: Vec<AttemptFailure>,
    pub timestamp: DateTime<Utc>,
}

/// Channelled logging backend the router writes into.
pub trait LogBackend: Send + Sync {
    fn fatal(&self, event: &LogEvent);
    fn error(&self, event: &LogEvent);
    fn warn(&self, event: &LogEvent);
    fn info(&self, event: &LogEvent);
    fn debug(&self, event: &LogEvent);
}

/// Routes events to backend channels by status and severity.
#[derive(Clone)]
pub struct LogRouter {
    backend: Arc<dyn LogBackend>,
}

impl LogRouter {
    pub fn new(backend: Arc<dyn LogBackend>) -> Self {
        Self { backend }
    }

    /// Success always routes to the informational channel, whatever the
    /// configured severity; failures route by severity.
    pub fn emit(&self, event: LogEvent) {
        match event.status {
            LogStatus::Success => self.backend.info(&event),
            LogStatus::Failure => match event.severity {
                Severity::Fatal => self.backend.fatal(&event),
                Severity::Critical => self.backend.error(&event),
                Severity::Nonblocking => self.backend.warn(&event),
                Severity::Info => self.backend.info(&event),
                Severity::Debug => self.backend.debug(&event),
            },
        }
    }
}

/// Backend that writes through the `log` crate facade.
///
/// `log` has no fatal level, so the fatal channel lands on `log::error!`
/// with a distinct marker.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdLogBackend;

fn format_event(event: &LogEvent) -> String {
    let retries = if event.retry_history.is_empty() {
        String::new()
    } else {
        format!(" retries={}", event.retry_history.len())
    };
    format!(
        "[{}] {} {:?} ({}ms){} {}",
        event.run_id,
        event.scope,
        event.status,
        event.execution_time.as_millis(),
        retries,
        event.message
    )
}

impl LogBackend for StdLogBackend {
    fn fatal(&self, event: &LogEvent) {
        log::error!("FATAL {}", format_event(event));
    }

    fn error(&self, event: &LogEvent) {
        log::error!("{}", format_event(event));
    }

    fn warn(&self, event: &LogEvent) {
        log::warn!("{}", format_event(event));
    }

    fn info(&self, event: &LogEvent) {
        log::info!("{}", format_event(event));
    }

    fn debug(&self, event: &LogEvent) {
        log::debug!("{}", format_event(event));
    }
}
