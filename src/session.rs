//! Rendering capability consumed by the engine.
//!
//! The engine never parses HTML itself; it drives an external rendering
//! engine through these traits. A [`Renderer`] launches one [`Session`] per
//! run; the session can navigate and close, and hands out opaque
//! [`ElementRef`] tokens that only the provider that requested them knows how
//! to interpret.
//!
//! Session handles are internally shared (driver pages usually are), so the
//! methods take `&self` and the engine can let concurrent extraction tasks
//! share the session while keeping exclusive ownership of its lifecycle.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

/// Options applied when launching a rendering session.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub ignore_https_errors: bool,
    pub user_agent: String,
}

/// What the driver reported for a navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavResponse {
    pub status: u16,
}

/// Opaque handle to a DOM element, minted by the renderer and meaningful
/// only to the provider that obtained it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRef {
    pub remote_id: String,
}

impl ElementRef {
    pub fn new(remote_id: impl Into<String>) -> Self {
        Self {
            remote_id: remote_id.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("navigation timed out after {0:?}")]
    Timeout(Duration),
    #[error("failed to launch rendering session: {0}")]
    Launch(String),
    #[error("rendering backend error: {0}")]
    Backend(String),
}

/// Launches rendering sessions.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn launch(&self, options: LaunchOptions) -> Result<Arc<dyn Session>, SessionError>;
}

/// One exclusive rendering session, owned by the engine for a run's lifetime.
#[async_trait]
pub trait Session: Send + Sync {
    /// Navigate to `url`. `Ok(None)` mirrors a driver that produced no
    /// response object for the navigation, which the engine treats as a
    /// retryable failure.
    async fn goto(
        &self,
        url: &Url,
        timeout: Duration,
    ) -> Result<Option<NavResponse>, SessionError>;

    async fn close(&self) -> Result<(), SessionError>;
}
