//! Bounded-concurrency crawl scheduler.
//!
//! One coordinator loop, up to `maxConcurrent` worker tasks in flight. The
//! coordinator is the only consumer of the frontier head; workers fetch,
//! extract, filter, enqueue, and append their own result. A worker failure is
//! recorded against its URL and never crosses into the coordinator or its
//! siblings.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinSet;
use tracing::{debug, warn};
use url::Url;

use crate::core::config;
use crate::core::types::{LogLevel, ScanResult, ScanStatus};
use crate::errors::{classify, synthesized_status};
use crate::fetch::FetchStrategy;
use crate::scan::frontier::Frontier;
use crate::scan::Admission;
use crate::session::{wait_if_paused, LogContext, SessionStore};
use crate::urlkit::is_static_asset;

/// Everything a worker needs, shared across the pool.
pub(crate) struct ScanContext {
    pub store: Arc<SessionStore>,
    pub frontier: Arc<Frontier>,
    pub admission: Arc<Admission>,
    pub strategy: FetchStrategy,
    pub max_depth: usize,
    pub max_pages: usize,
}

pub(crate) struct Scheduler {
    ctx: Arc<ScanContext>,
    max_concurrent: usize,
}

impl Scheduler {
    pub fn new(ctx: Arc<ScanContext>, max_concurrent: usize) -> Self {
        Self {
            ctx,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Drive the crawl until the frontier drains, the page cap is hit, or a
    /// stop is observed. Returns `true` when the crawl was stopped by user.
    pub async fn run(&self) -> bool {
        let mut workers: JoinSet<()> = JoinSet::new();
        let mut stopped = false;
        let mut stall_iterations: u32 = 0;
        let mut last_queue_size: Option<usize> = None;

        loop {
            if wait_if_paused(&self.ctx.store.control).await.is_err() {
                stopped = true;
                break;
            }
            if self.ctx.store.results_len() >= self.ctx.max_pages {
                debug!("page cap reached, draining workers");
                break;
            }

            if workers.len() >= self.max_concurrent {
                if let Some(Err(e)) = workers.join_next().await {
                    warn!("worker task failed: {e}");
                }
                continue;
            }

            match self.ctx.frontier.pop_and_mark() {
                Some((url, depth)) => {
                    stall_iterations = 0;
                    // Re-check at dequeue: discovered-then-reclassified asset
                    // URLs are consumed without a result record.
                    if is_static_asset(&url) {
                        debug!("skipping static asset {url}");
                        continue;
                    }
                    let ctx = Arc::clone(&self.ctx);
                    workers.spawn(async move {
                        scan_one(ctx, url, depth).await;
                    });
                }
                None => {
                    if workers.is_empty() {
                        break;
                    }
                    let (queue_size, visited_count) = self.ctx.frontier.gauges();
                    if last_queue_size == Some(queue_size) {
                        stall_iterations += 1;
                        if stall_iterations > config::STUCK_QUEUE_ITERATIONS {
                            self.ctx.store.log(
                                LogLevel::Warning,
                                "Queue has not moved for several cycles, still waiting on workers",
                                LogContext {
                                    queue_size,
                                    visited_count,
                                    ..Default::default()
                                },
                            );
                            stall_iterations = 0;
                        }
                    } else {
                        stall_iterations = 0;
                    }
                    last_queue_size = Some(queue_size);

                    tokio::select! {
                        joined = workers.join_next() => {
                            if let Some(Err(e)) = joined {
                                warn!("worker task failed: {e}");
                            }
                        }
                        _ = tokio::time::sleep(Duration::from_millis(config::ANTI_STALL_TIMER_MS)) => {}
                    }
                }
            }
        }

        // Let in-flight fetches finish; their results still count. Failures
        // settle individually.
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                warn!("worker task failed during drain: {e}");
            }
        }

        stopped
    }
}

/// One worker unit: fetch, extract, filter, enqueue, record.
async fn scan_one(ctx: Arc<ScanContext>, url: Url, depth: usize) {
    let (queue_size, visited_count) = ctx.frontier.gauges();
    ctx.store.log(
        LogLevel::Info,
        format!("Scanning {url} (depth {depth})"),
        LogContext {
            url: Some(url.as_str()),
            queue_size,
            visited_count,
            ..Default::default()
        },
    );

    match ctx.strategy.fetch(&url).await {
        Ok(outcome) => {
            ctx.store.record_response_time(outcome.response_time_ms);

            // Normalize, filter, and deduplicate the raw candidates; the
            // surviving set is both the result's `links` and the enqueue set.
            let mut links: Vec<String> = Vec::new();
            let mut seen: HashSet<String> = HashSet::new();
            for raw in &outcome.raw_links {
                let Some(normalized) = ctx.admission.admit(raw, &outcome.final_url) else {
                    continue;
                };
                if !seen.insert(normalized.as_str().to_string()) {
                    continue;
                }
                links.push(normalized.as_str().to_string());
                if depth < ctx.max_depth {
                    ctx.frontier.push(normalized, depth + 1);
                }
            }
            ctx.store.add_links_found(links.len());

            let status_code = outcome.status;
            let status = ScanResult::status_for_code(status_code);
            let mut result = ScanResult {
                url: url.to_string(),
                status,
                status_code,
                links,
                response_body: None,
                error: None,
                error_kind: None,
                error_severity: None,
                error_retryable: None,
                suggested_action: None,
                timestamp: Utc::now().to_rfc3339(),
                depth,
            };

            let (queue_size, visited_count) = ctx.frontier.gauges();
            if status == ScanStatus::Error {
                let code = status_code.unwrap_or(0);
                let message = format!("HTTP {code}");
                let class = classify(status_code, "", Some(&outcome.body));
                if (400..600).contains(&code) {
                    result.response_body =
                        Some(outcome.body.chars().take(config::RESPONSE_BODY_PREFIX_CHARS).collect());
                }
                result.error = Some(message.clone());
                result.error_kind = Some(class.kind);
                result.error_severity = Some(class.severity);
                result.error_retryable = Some(class.retryable);
                result.suggested_action = Some(class.suggested_action.to_string());
                ctx.store.record_error(url.as_str(), &message, &class, status_code);

                let level = match class.severity {
                    crate::core::types::ErrorSeverity::Critical => LogLevel::Critical,
                    _ => LogLevel::Error,
                };
                ctx.store.log(
                    level,
                    format!("Error {code} at {url}"),
                    LogContext {
                        url: Some(url.as_str()),
                        details: Some(class.suggested_action),
                        response_time: Some(outcome.response_time_ms),
                        queue_size,
                        visited_count,
                    },
                );
            } else {
                ctx.store.log(
                    LogLevel::Success,
                    format!(
                        "Scanned {url} ({}, {} links)",
                        status_code.unwrap_or(200),
                        result.links.len()
                    ),
                    LogContext {
                        url: Some(url.as_str()),
                        response_time: Some(outcome.response_time_ms),
                        queue_size,
                        visited_count,
                        ..Default::default()
                    },
                );
            }

            if !ctx.store.append_result(result, ctx.max_pages) {
                debug!("result for {url} dropped at page cap");
            }
        }
        Err(e) => {
            let message = e.to_string();
            let class = classify(None, &message, None);
            let status_code = synthesized_status(class.kind);
            ctx.store.record_error(url.as_str(), &message, &class, status_code);

            let result = ScanResult {
                url: url.to_string(),
                status: ScanStatus::Error,
                status_code,
                links: Vec::new(),
                response_body: None,
                error: Some(message.clone()),
                error_kind: Some(class.kind),
                error_severity: Some(class.severity),
                error_retryable: Some(class.retryable),
                suggested_action: Some(class.suggested_action.to_string()),
                timestamp: Utc::now().to_rfc3339(),
                depth,
            };

            let (queue_size, visited_count) = ctx.frontier.gauges();
            let level = match class.severity {
                crate::core::types::ErrorSeverity::Critical => LogLevel::Critical,
                _ => LogLevel::Error,
            };
            ctx.store.log(
                level,
                format!("Failed to scan {url}: {message}"),
                LogContext {
                    url: Some(url.as_str()),
                    details: Some(class.suggested_action),
                    queue_size,
                    visited_count,
                    ..Default::default()
                },
            );

            if !ctx.store.append_result(result, ctx.max_pages) {
                debug!("error result for {url} dropped at page cap");
            }
        }
    }
}
