use std::sync::Arc;
use std::time::Duration;

use crate::core::config;
use crate::session::SessionRegistry;

/// Process-wide engine state.
///
/// One value per process; every scan session hangs off `sessions` under its
/// own `scanId`. The HTTP client is shared across scans (connection pooling);
/// per-request deadlines come from each scan's `timeoutMs`.
#[derive(Clone)]
pub struct AppState {
    pub http_client: reqwest::Client,
    pub sessions: Arc<SessionRegistry>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("active_sessions", &self.sessions.len())
            .finish()
    }
}

impl AppState {
    pub fn new(http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            sessions: Arc::new(SessionRegistry::new()),
        }
    }

    /// Client with redirect-following enabled, browser-like timeouts from env.
    pub fn default_http_client() -> reqwest::Client {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(config::http_timeout_secs()))
            .connect_timeout(Duration::from_secs(config::http_connect_timeout_secs()))
            .redirect(reqwest::redirect::Policy::limited(10))
            .gzip(true)
            .brotli(true)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new())
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(Self::default_http_client())
    }
}
