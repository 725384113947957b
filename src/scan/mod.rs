//! The crawl engine entry point.
//!
//! `scan_website` runs the full pipeline: seed validation, optional headless
//! browser launch, the login preamble, seed discovery, the bounded scheduler,
//! and final summary assembly. The session store stays pollable for the
//! configured retention window after the response is returned.

pub mod frontier;
pub mod scheduler;
pub mod seeds;

pub use frontier::Frontier;

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use url::Url;

use crate::auth;
use crate::core::config;
use crate::core::types::{LogLevel, ScanConfig, ScanResponse};
use crate::core::AppState;
use crate::errors::ScanError;
use crate::extract::{ExtractOptions, StaticExtractor};
use crate::fetch::{FetchStrategy, LiteFetcher, RichFetcher, ScanBrowser};
use crate::scan::scheduler::{ScanContext, Scheduler};
use crate::session::LogContext;
use crate::urlkit::{is_static_asset, normalize, same_origin, PathFilter};

/// The admission gate for discovered URLs: normalize against the page base,
/// then require same-origin, non-static-asset, and a path-filter match.
pub struct Admission {
    origin: Url,
    filter: PathFilter,
    excluded_protocols: Vec<String>,
}

impl Admission {
    pub fn new(cfg: &ScanConfig, origin: Url) -> Self {
        Self {
            origin,
            filter: PathFilter::new(cfg.path_regex_filter.as_deref()),
            excluded_protocols: cfg.exclude_protocols.clone(),
        }
    }

    pub fn admit(&self, raw: &str, base: &Url) -> Option<Url> {
        let url = normalize(raw, base, &self.excluded_protocols)?;
        if !same_origin(&url, &self.origin) {
            return None;
        }
        if is_static_asset(&url) {
            return None;
        }
        if !self.filter.matches(&url) {
            return None;
        }
        Some(url)
    }
}

/// Default browser-like headers merged under the scan's custom headers
/// (custom wins, name-insensitively).
fn merged_headers(cfg: &ScanConfig) -> Vec<(String, String)> {
    let mut headers: Vec<(String, String)> = config::default_headers()
        .into_iter()
        .map(|(n, v)| (n.to_string(), v.to_string()))
        .collect();
    for (name, value) in &cfg.custom_headers {
        if let Some(existing) = headers
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            existing.1 = value.clone();
        } else {
            headers.push((name.clone(), value.clone()));
        }
    }
    headers
}

/// Run one complete crawl session. Long-running; observers stream progress
/// through `get_scan_logs` / `get_scan_results` while this is in flight.
pub async fn scan_website(
    state: &AppState,
    mut cfg: ScanConfig,
) -> Result<ScanResponse, ScanError> {
    // Fail fast on a malformed seed, before any session state exists.
    let seed = Url::parse(cfg.url.trim()).map_err(|e| ScanError::InvalidSeedUrl {
        url: cfg.url.clone(),
        reason: e.to_string(),
    })?;
    if seed.scheme() != "http" && seed.scheme() != "https" {
        return Err(ScanError::InvalidSeedUrl {
            url: cfg.url.clone(),
            reason: format!("unsupported scheme '{}'", seed.scheme()),
        });
    }

    let scan_id = cfg
        .scan_id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    cfg.scan_id = Some(scan_id.clone());

    let store = state.sessions.create(&scan_id, cfg.max_log_entries);
    info!("scan {} starting at {}", scan_id, seed);
    store.log(
        LogLevel::Info,
        format!("Scan started at {seed}"),
        LogContext {
            url: Some(seed.as_str()),
            ..Default::default()
        },
    );

    // Rich downgrades to Lite when no browser can be launched.
    let browser: Option<Arc<ScanBrowser>> = if cfg.use_headless_browser {
        match ScanBrowser::launch().await {
            Ok(b) => Some(Arc::new(b)),
            Err(e) => {
                warn!("headless browser unavailable: {e}");
                store.log(
                    LogLevel::Warning,
                    format!("Headless browser unavailable, using HTTP fetch: {e}"),
                    LogContext::default(),
                );
                None
            }
        }
    } else {
        None
    };

    // Login preamble; its only outputs are the cookie jar and maybe a
    // post-login start URL.
    let auth_result = if cfg.has_credentials() {
        auth::authenticate(state, &cfg, browser.as_deref(), &store).await
    } else {
        auth::AuthResult::default()
    };
    let start_url = auth_result
        .start_url
        .as_deref()
        .and_then(|s| Url::parse(s).ok())
        .unwrap_or_else(|| seed.clone());

    let timeout = Duration::from_millis(cfg.timeout_ms.max(1));
    let admission = Arc::new(Admission::new(&cfg, start_url.clone()));
    let frontier = Arc::new(Frontier::new());
    let headers = merged_headers(&cfg);
    let extract_opts = ExtractOptions::from(&cfg);

    let strategy = match &browser {
        Some(b) => FetchStrategy::Rich(RichFetcher::new(
            Arc::clone(b),
            extract_opts,
            headers.clone(),
            auth_result.jar.pairs(),
            timeout,
            cfg.dynamic_content_wait,
            cfg.detect_soft_errors,
        )),
        None => FetchStrategy::Lite(LiteFetcher::new(
            state.http_client.clone(),
            StaticExtractor::new(extract_opts),
            headers,
            auth_result.jar.header_value(),
            timeout,
            cfg.detect_soft_errors,
        )),
    };
    store.log(
        LogLevel::Info,
        format!("Using {} fetch strategy", strategy.name()),
        LogContext::default(),
    );

    // Sitemap and robots discovery seeds the frontier at depth 0; the seed
    // URL itself goes in afterwards (dequeue-time dedup makes order safe).
    let aux_tasks = seeds::discover(
        state.http_client.clone(),
        start_url.clone(),
        timeout,
        Arc::clone(&admission),
        Arc::clone(&frontier),
        Arc::clone(&store),
    )
    .await;
    frontier.push(start_url.clone(), 0);

    let ctx = Arc::new(ScanContext {
        store: Arc::clone(&store),
        frontier: Arc::clone(&frontier),
        admission,
        strategy,
        max_depth: cfg.max_depth,
        max_pages: cfg.max_pages.max(1),
    });
    let stopped = Scheduler::new(ctx, cfg.max_concurrent).run().await;

    // No background task outlives the scan.
    for task in aux_tasks {
        task.abort();
    }
    if let Some(b) = &browser {
        b.close().await;
    }

    let (queue_size, visited_count) = frontier.gauges();
    if stopped {
        store.log(
            LogLevel::Warning,
            "Scan stopped by user",
            LogContext {
                queue_size,
                visited_count,
                ..Default::default()
            },
        );
    } else {
        store.log(
            LogLevel::Success,
            format!("Scan complete: {} pages scanned", store.results_len()),
            LogContext {
                queue_size,
                visited_count,
                ..Default::default()
            },
        );
    }

    let response = ScanResponse {
        results: store.snapshot_results(),
        logs: store.snapshot_logs(),
        scan_id: scan_id.clone(),
        error_summary: store.error_summary(),
    };

    state
        .sessions
        .schedule_eviction(&scan_id, Duration::from_secs(cfg.log_retention_minutes * 60));

    info!(
        "scan {} finished: {} results, {} errors",
        scan_id,
        response.results.len(),
        response.error_summary.total
    );
    Ok(response)
}
