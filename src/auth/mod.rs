//! Authentication preamble: one-shot form login before the crawl starts.
//!
//! Strategy selection matches the crawl: when a headless browser session is
//! already available the form is driven through it, otherwise the HTTP
//! negotiator runs. The sole outputs are the session cookie jar and an
//! optional post-login start URL; after this module returns, the jar is
//! read-only for the rest of the scan.

pub mod browser;
pub mod cookies;
pub mod form;
pub mod http;

pub use cookies::CookieJar;

use anyhow::Result;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

use crate::core::types::{LogLevel, ScanConfig};
use crate::core::AppState;
use crate::fetch::ScanBrowser;
use crate::session::{LogContext, SessionStore};

/// Body tokens that mark a page as still being the login screen.
const LOGIN_PAGE_MARKERS: &[&str] = &["login", "đăng nhập", "dang-nhap"];

#[derive(Debug, Default)]
pub struct AuthResult {
    pub jar: CookieJar,
    /// Effective crawl start URL after login and verification.
    pub start_url: Option<String>,
}

/// Run the login preamble. Never fails the scan: any error is logged as a
/// warning and the crawl proceeds unauthenticated from the configured seed.
pub async fn authenticate(
    state: &AppState,
    cfg: &ScanConfig,
    browser: Option<&ScanBrowser>,
    store: &SessionStore,
) -> AuthResult {
    let (Some(login_url), Some(username), Some(password)) =
        (&cfg.login_url, &cfg.username, &cfg.password)
    else {
        return AuthResult::default();
    };

    store.log(
        LogLevel::Info,
        format!("Logging in at {login_url}"),
        LogContext::default(),
    );

    let timeout = Duration::from_millis(cfg.timeout_ms);
    let attempt = run_login(cfg, browser, login_url, username, password, timeout).await;

    let (jar, candidate_start) = match attempt {
        Ok(pair) => pair,
        Err(e) => {
            warn!("login failed: {}", e);
            store.log(
                LogLevel::Warning,
                format!("Login failed, continuing unauthenticated: {e}"),
                LogContext::default(),
            );
            return AuthResult::default();
        }
    };

    let start_url = verify_start_url(state, login_url, &jar, candidate_start, store).await;

    if !jar.is_empty() {
        info!("login produced {} cookies", jar.pairs().len());
        store.log(
            LogLevel::Success,
            "Login succeeded, session cookies captured",
            LogContext::default(),
        );
    }

    AuthResult { jar, start_url }
}

async fn run_login(
    cfg: &ScanConfig,
    browser: Option<&ScanBrowser>,
    login_url: &str,
    username: &str,
    password: &str,
    timeout: Duration,
) -> Result<(CookieJar, Option<String>)> {
    if let Some(browser) = browser {
        let outcome = browser::login(
            browser,
            login_url,
            username,
            password,
            cfg.username_field.as_deref(),
            cfg.password_field.as_deref(),
            timeout,
        )
        .await?;
        return Ok((outcome.jar, outcome.landed_url));
    }

    let parsed = Url::parse(login_url)?;
    let outcome = http::login(
        &parsed,
        username,
        password,
        cfg.username_field.as_deref(),
        cfg.password_field.as_deref(),
        timeout,
    )
    .await?;
    Ok((outcome.jar, outcome.redirect_url))
}

/// Post-login verification: if the effective start URL still looks like the
/// login page, warn and fall back to the operator-supplied seed.
async fn verify_start_url(
    state: &AppState,
    login_url: &str,
    jar: &CookieJar,
    candidate: Option<String>,
    store: &SessionStore,
) -> Option<String> {
    let candidate_url = candidate?;

    if candidate_url.trim_end_matches('/') == login_url.trim_end_matches('/') {
        store.log(
            LogLevel::Warning,
            "Post-login URL is still the login page, using the configured seed",
            LogContext {
                url: Some(&candidate_url),
                ..Default::default()
            },
        );
        return None;
    }

    let mut request = state.http_client.get(&candidate_url);
    if let Some(cookies) = jar.header_value() {
        request = request.header("Cookie", cookies);
    }
    let looks_like_login = match request.send().await {
        Ok(response) => {
            let body = response.text().await.unwrap_or_default().to_lowercase();
            LOGIN_PAGE_MARKERS.iter().any(|m| body.contains(m))
        }
        // Unverifiable is not a failure; keep the redirect target.
        Err(_) => false,
    };

    if looks_like_login {
        store.log(
            LogLevel::Warning,
            "Post-login page still shows a login form, using the configured seed",
            LogContext {
                url: Some(&candidate_url),
                ..Default::default()
            },
        );
        return None;
    }

    Some(candidate_url)
}
