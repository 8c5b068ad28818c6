//! Structured fault taxonomy for orchestrated calls.
//!
//! Every failure crossing an orchestration boundary is normalised into a
//! [`ScrapeFault`]: a status code for the ingress layer, a `suppress` flag for
//! non-error business outcomes (a page with no reviews is a successful empty
//! result, not a failure), and a `continue_execution` flag deciding whether
//! the surrounding scope swallows the fault or tears the run down.
//!
//! Normalisation happens exactly once. Collaborator error types (`session`,
//! `providers`, `proxy`) convert into a fault at the boundary; a value that is
//! already a `ScrapeFault` passes through nested scopes untouched.

use thiserror::Error;
use url::Url;

use crate::providers::ProviderError;
use crate::proxy::ProxyError;
use crate::retry::AttemptFailure;
use crate::session::SessionError;

/// Enumerated fault categories, mirrored by the ingress status mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Target URL rejected by the provider's validity pattern.
    InvalidBusinessUrl,
    /// No registered provider strategy under the requested name.
    ProviderNotImplemented,
    /// Provider reported no content; the run ends as a successful empty result.
    NoReviews,
    /// Navigation retry budget exhausted, or navigation failed outright.
    GetPage,
    /// Anything that was not normalised closer to its origin.
    Unexpected,
}

/// Normalised fault carried through the run state machine.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ScrapeFault {
    pub kind: FaultKind,
    pub status_code: u16,
    /// Suppressed faults are logged as successes and never surface as errors.
    pub suppress: bool,
    /// When set, the wrapping scope swallows the fault and carries on.
    pub continue_execution: bool,
    pub message: String,
    /// Chronological navigation failures, populated for [`FaultKind::GetPage`].
    pub retry_history: Vec<AttemptFailure>,
}

impl ScrapeFault {
    fn new(kind: FaultKind, status_code: u16, message: String) -> Self {
        Self {
            kind,
            status_code,
            suppress: false,
            continue_execution: false,
            message,
            retry_history: Vec::new(),
        }
    }

    pub fn invalid_business_url(url: &Url) -> Self {
        Self::new(
            FaultKind::InvalidBusinessUrl,
            400,
            format!("{url} is an invalid business URL"),
        )
    }

    pub fn provider_not_implemented(provider: &str) -> Self {
        Self::new(
            FaultKind::ProviderNotImplemented,
            501,
            format!("provider {provider} not implemented"),
        )
    }

    pub fn no_reviews(url: &Url) -> Self {
        let mut fault = Self::new(FaultKind::NoReviews, 200, format!("{url} has no reviews"));
        fault.suppress = true;
        fault
    }

    pub fn get_page(message: impl Into<String>, retry_history: Vec<AttemptFailure>) -> Self {
        let mut fault = Self::new(FaultKind::GetPage, 501, message.into());
        fault.retry_history = retry_history;
        fault
    }

    pub fn unexpected(message: impl std::fmt::Display) -> Self {
        Self::new(FaultKind::Unexpected, 501, message.to_string())
    }

    /// Override the propagation policy, e.g. when a page-scope wrapper
    /// downgrades its faults so one bad page cannot sink the run.
    pub fn with_continue(mut self, continue_execution: bool) -> Self {
        self.continue_execution = continue_execution;
        self
    }
}

impl From<SessionError> for ScrapeFault {
    fn from(err: SessionError) -> Self {
        ScrapeFault::unexpected(err)
    }
}

impl From<ProviderError> for ScrapeFault {
    fn from(err: ProviderError) -> Self {
        ScrapeFault::unexpected(err)
    }
}

impl From<ProxyError> for ScrapeFault {
    fn from(err: ProxyError) -> Self {
        ScrapeFault::unexpected(err)
    }
}
