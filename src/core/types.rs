use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::config;

// ───────────────────────────────────────────────────────────────────────────
// Scan configuration: one immutable value per scan session
// ───────────────────────────────────────────────────────────────────────────

/// Full configuration for one crawl session.
///
/// Only `url` is required; everything else has an engine default. Field names
/// follow the camelCase JSON contract of the RPC surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScanConfig {
    /// Seed URL. Must be an absolute http/https URL.
    pub url: String,

    // ── Optional form-login preamble ──
    pub login_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Operator override for the username input name (auto-detected otherwise).
    pub username_field: Option<String>,
    /// Operator override for the password input name (auto-detected otherwise).
    pub password_field: Option<String>,

    // ── Crawl bounds ──
    pub max_depth: usize,
    pub max_pages: usize,
    pub timeout_ms: u64,
    pub max_concurrent: usize,

    /// Extra request headers, merged over the engine's browser-like defaults
    /// (custom wins).
    pub custom_headers: HashMap<String, String>,

    /// Case-insensitive regex applied to the URL path only. Empty = match all.
    /// An invalid pattern matches nothing, so no discovered link is enqueued.
    pub path_regex_filter: Option<String>,

    /// Rich (headless Chromium) vs Lite (HTTP + static parse) fetch strategy.
    /// Rich silently downgrades to Lite when no browser can be launched.
    pub use_headless_browser: bool,

    /// Session identifier; generated when absent.
    pub scan_id: Option<String>,

    // ── Link-extraction toggles ──
    pub include_data_attributes: bool,
    pub include_onclick: bool,
    pub include_forms: bool,
    pub include_meta_refresh: bool,
    pub include_canonical: bool,
    pub include_interactive_elements: bool,

    /// URL schemes rejected by the normalizer.
    pub exclude_protocols: Vec<String>,

    /// Overwrite a literal 200 status when the body looks like an error page.
    pub detect_soft_errors: bool,

    /// Log ring-buffer capacity (oldest entries dropped on overflow).
    pub max_log_entries: usize,
    /// Session store TTL after the crawl completes, in minutes.
    pub log_retention_minutes: u64,
    /// Post-navigation settle delay for the Rich strategy, in milliseconds.
    pub dynamic_content_wait: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            login_url: None,
            username: None,
            password: None,
            username_field: None,
            password_field: None,
            max_depth: config::DEFAULT_MAX_DEPTH,
            max_pages: config::DEFAULT_MAX_PAGES,
            timeout_ms: config::DEFAULT_TIMEOUT_MS,
            max_concurrent: config::DEFAULT_MAX_CONCURRENT,
            custom_headers: HashMap::new(),
            path_regex_filter: None,
            use_headless_browser: false,
            scan_id: None,
            include_data_attributes: true,
            include_onclick: true,
            include_forms: true,
            include_meta_refresh: true,
            include_canonical: true,
            include_interactive_elements: true,
            exclude_protocols: config::default_excluded_protocols(),
            detect_soft_errors: true,
            max_log_entries: config::DEFAULT_MAX_LOG_ENTRIES,
            log_retention_minutes: config::DEFAULT_LOG_RETENTION_MINUTES,
            dynamic_content_wait: config::DEFAULT_DYNAMIC_CONTENT_WAIT_MS,
        }
    }
}

impl ScanConfig {
    /// Minimal config for a given seed; used widely in tests.
    pub fn for_url(url: &str) -> Self {
        Self {
            url: url.to_string(),
            ..Default::default()
        }
    }

    /// True when the login preamble should run.
    pub fn has_credentials(&self) -> bool {
        self.login_url.is_some() && self.username.is_some() && self.password.is_some()
    }
}

// ───────────────────────────────────────────────────────────────────────────
// Per-URL scan result
// ───────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Success,
    Error,
}

/// One record per scanned URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub url: String,
    /// `success` iff the (soft-error-corrected) status code is 2xx.
    pub status: ScanStatus,
    /// Absent on transport failure with no synthesizable code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Same-origin normalized links found on this page, filtered and
    /// deduplicated, in first-encountered order.
    pub links: Vec<String>,
    /// Bounded body prefix; populated only for 4xx/5xx statuses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_severity: Option<ErrorSeverity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_retryable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
    /// ISO-8601 (RFC 3339) capture time.
    pub timestamp: String,
    pub depth: usize,
}

impl ScanResult {
    pub fn status_for_code(code: Option<u16>) -> ScanStatus {
        match code {
            Some(c) if (200..300).contains(&c) => ScanStatus::Success,
            _ => ScanStatus::Error,
        }
    }
}

// ───────────────────────────────────────────────────────────────────────────
// Structured scan log events
// ───────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
    Critical,
}

/// Counters snapshot attached to every log event at emit time.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStats {
    pub urls_scanned: usize,
    pub links_found: usize,
    pub errors: usize,
    pub queue_size: usize,
    pub visited_count: usize,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    /// Results recorded so far.
    pub current: usize,
    /// Visited plus still-queued URLs; a moving estimate, not a promise.
    pub total: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSnapshot {
    /// Response time of the event's own URL, when the event has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time: Option<u64>,
    /// Milliseconds since the scan started.
    pub elapsed_time: u64,
    /// Mean of all observed response times so far, in milliseconds.
    pub average_response_time: u64,
}

/// One streaming log event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanLog {
    #[serde(rename = "type")]
    pub level: LogLevel,
    pub message: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub stats: ScanStats,
    pub progress: ProgressSnapshot,
    pub performance: PerformanceSnapshot,
}

// ───────────────────────────────────────────────────────────────────────────
// Error taxonomy (wire representation; classification lives in errors.rs)
// ───────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Timeout,
    Network,
    Server,
    Client,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::Network => "network",
            ErrorKind::Server => "server",
            ErrorKind::Client => "client",
            ErrorKind::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorSeverity::Medium => "medium",
            ErrorSeverity::High => "high",
            ErrorSeverity::Critical => "critical",
        }
    }
}

/// One entry in the bounded recent-error tail.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentError {
    pub url: String,
    pub message: String,
    pub severity: ErrorSeverity,
    pub timestamp: String,
}

/// Aggregate error summary returned with the final scan response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorSummary {
    pub total: usize,
    pub by_kind: HashMap<String, usize>,
    pub by_severity: HashMap<String, usize>,
    pub by_status_code: HashMap<String, usize>,
    /// Most recent errors, newest last.
    pub recent: Vec<RecentError>,
}

// ───────────────────────────────────────────────────────────────────────────
// RPC envelopes
// ───────────────────────────────────────────────────────────────────────────

/// Final output of `scanWebsite`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResponse {
    pub results: Vec<ScanResult>,
    pub logs: Vec<ScanLog>,
    pub scan_id: String,
    pub error_summary: ErrorSummary,
}

/// Acknowledgement for pause/resume/stop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlAck {
    pub success: bool,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_config_defaults_are_sane() {
        let cfg = ScanConfig::for_url("https://example.test/");
        assert_eq!(cfg.max_depth, 3);
        assert!(cfg.max_pages > 0);
        assert!(cfg.exclude_protocols.contains(&"javascript:".to_string()));
        assert!(cfg.detect_soft_errors);
        assert!(!cfg.has_credentials());
    }

    #[test]
    fn has_credentials_requires_all_three() {
        let mut cfg = ScanConfig::for_url("https://example.test/");
        cfg.login_url = Some("https://example.test/login".into());
        cfg.username = Some("admin".into());
        assert!(!cfg.has_credentials());
        cfg.password = Some("secret".into());
        assert!(cfg.has_credentials());
    }

    #[test]
    fn status_follows_corrected_code() {
        assert_eq!(
            ScanResult::status_for_code(Some(204)),
            ScanStatus::Success
        );
        assert_eq!(ScanResult::status_for_code(Some(404)), ScanStatus::Error);
        assert_eq!(ScanResult::status_for_code(Some(301)), ScanStatus::Error);
        assert_eq!(ScanResult::status_for_code(None), ScanStatus::Error);
    }

    #[test]
    fn scan_config_json_contract_is_camel_case() {
        let cfg: ScanConfig = serde_json::from_str(
            r#"{"url":"https://a.test/","maxPages":7,"useHeadlessBrowser":true,
                "pathRegexFilter":"/api","customHeaders":{"X-Probe":"1"}}"#,
        )
        .unwrap();
        assert_eq!(cfg.max_pages, 7);
        assert!(cfg.use_headless_browser);
        assert_eq!(cfg.path_regex_filter.as_deref(), Some("/api"));
        assert_eq!(cfg.custom_headers.get("X-Probe").map(String::as_str), Some("1"));
    }

    #[test]
    fn scan_log_serializes_type_field() {
        let log = ScanLog {
            level: LogLevel::Warning,
            message: "m".into(),
            timestamp: "t".into(),
            url: None,
            details: None,
            stats: ScanStats::default(),
            progress: ProgressSnapshot::default(),
            performance: PerformanceSnapshot::default(),
        };
        let v = serde_json::to_value(&log).unwrap();
        assert_eq!(v["type"], "warning");
        assert!(v["stats"]["urlsScanned"].is_number());
    }
}
