//! Failure classification and the per-scan error aggregate.
//!
//! The classifier is a pure function from `(optional status, message, optional
//! body)` to a `{kind, severity, retryable, suggested action}` tuple; rules
//! are applied in priority order. Worker code records every classified error
//! into the session's `ErrorStats`, which keeps totals by kind, severity, and
//! status code plus a bounded tail of recent entries.

use std::collections::VecDeque;

use chrono::Utc;
use thiserror::Error;

use crate::core::config;
use crate::core::types::{ErrorKind, ErrorSeverity, ErrorSummary, RecentError};

/// Engine-level failures that cross the API boundary.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("invalid seed URL '{url}': {reason}")]
    InvalidSeedUrl { url: String, reason: String },

    #[error("unknown scan id '{0}'")]
    UnknownScan(String),

    /// Raised by `wait_if_paused` once a sticky stop is observed.
    #[error("scan stopped by user")]
    Stopped,
}

/// Output of the classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: ErrorKind,
    pub severity: ErrorSeverity,
    pub retryable: bool,
    pub suggested_action: &'static str,
}

const TIMEOUT_MARKERS: &[&str] = &[
    "timeout",
    "und_err_headers_timeout",
    "etimedout",
    "timeouterror",
    "abort",
    "deadline",
];

const NETWORK_MARKERS: &[&str] = &[
    "econnrefused",
    "enotfound",
    "econnreset",
    "econnaborted",
    "connection refused",
    "connection reset",
    "dns error",
    "failed to lookup",
    "net::err",
    "network",
];

const CRITICAL_MARKERS: &[&str] = &["out of memory", "memory", "crash", "fatal"];

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Map a raw failure to its taxonomy entry. Rules are checked in priority
/// order: status-based first, then message markers, then body markers.
pub fn classify(status: Option<u16>, message: &str, body: Option<&str>) -> Classification {
    if let Some(code) = status {
        if code >= 500 {
            return Classification {
                kind: ErrorKind::Server,
                severity: ErrorSeverity::High,
                retryable: true,
                suggested_action: "Server-side failure; retry later or check server logs",
            };
        }
        match code {
            401 | 403 => {
                return Classification {
                    kind: ErrorKind::Client,
                    severity: ErrorSeverity::High,
                    retryable: false,
                    suggested_action: "Access denied; verify credentials or session cookies",
                }
            }
            429 => {
                return Classification {
                    kind: ErrorKind::Client,
                    severity: ErrorSeverity::Medium,
                    retryable: true,
                    suggested_action: "Rate limited; reduce concurrency and retry",
                }
            }
            408 => {
                return Classification {
                    kind: ErrorKind::Client,
                    severity: ErrorSeverity::Medium,
                    retryable: true,
                    suggested_action: "Request timed out at the server; retry with a longer timeout",
                }
            }
            400..=499 => {
                return Classification {
                    kind: ErrorKind::Client,
                    severity: ErrorSeverity::Medium,
                    retryable: false,
                    suggested_action: "Client error; check the URL and request headers",
                }
            }
            _ => {}
        }
    }

    let message_lc = message.to_lowercase();
    if contains_any(&message_lc, TIMEOUT_MARKERS) {
        return Classification {
            kind: ErrorKind::Timeout,
            severity: ErrorSeverity::Medium,
            retryable: true,
            suggested_action: "Deadline exceeded; increase timeoutMs or retry",
        };
    }
    if contains_any(&message_lc, NETWORK_MARKERS) {
        return Classification {
            kind: ErrorKind::Network,
            severity: ErrorSeverity::High,
            retryable: true,
            suggested_action: "Network failure; check DNS and connectivity to the host",
        };
    }

    let body_lc = body.map(|b| b.to_lowercase()).unwrap_or_default();
    if contains_any(&message_lc, CRITICAL_MARKERS) || contains_any(&body_lc, CRITICAL_MARKERS) {
        return Classification {
            kind: ErrorKind::Unknown,
            severity: ErrorSeverity::Critical,
            retryable: false,
            suggested_action: "Crash-like failure reported; inspect the target service",
        };
    }

    Classification {
        kind: ErrorKind::Unknown,
        severity: ErrorSeverity::Medium,
        retryable: false,
        suggested_action: "Unclassified failure; inspect the error message",
    }
}

/// Synthesized status code for transport-level failures (no HTTP response).
pub fn synthesized_status(kind: ErrorKind) -> Option<u16> {
    match kind {
        ErrorKind::Timeout => Some(408),
        ErrorKind::Network => Some(503),
        _ => None,
    }
}

// ───────────────────────────────────────────────────────────────────────────
// Aggregate error statistics (one per scan session)
// ───────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct ErrorStats {
    total: usize,
    by_kind: std::collections::HashMap<String, usize>,
    by_severity: std::collections::HashMap<String, usize>,
    by_status_code: std::collections::HashMap<String, usize>,
    recent: VecDeque<RecentError>,
}

impl ErrorStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one classified error event. Event semantics: every call counts,
    /// with no per-URL deduplication.
    pub fn record(
        &mut self,
        url: &str,
        message: &str,
        class: &Classification,
        status: Option<u16>,
    ) {
        self.total += 1;
        *self.by_kind.entry(class.kind.as_str().to_string()).or_default() += 1;
        *self
            .by_severity
            .entry(class.severity.as_str().to_string())
            .or_default() += 1;
        if let Some(code) = status {
            *self.by_status_code.entry(code.to_string()).or_default() += 1;
        }

        self.recent.push_back(RecentError {
            url: url.to_string(),
            message: message.to_string(),
            severity: class.severity,
            timestamp: Utc::now().to_rfc3339(),
        });
        while self.recent.len() > config::ERROR_TAIL_CAP {
            self.recent.pop_front();
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Snapshot for the RPC response, with the tail trimmed to the last
    /// `ERRORS_IN_RESPONSE` entries.
    pub fn to_summary(&self) -> ErrorSummary {
        let skip = self.recent.len().saturating_sub(config::ERRORS_IN_RESPONSE);
        ErrorSummary {
            total: self.total,
            by_kind: self.by_kind.clone(),
            by_severity: self.by_severity.clone(),
            by_status_code: self.by_status_code.clone(),
            recent: self.recent.iter().skip(skip).cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_high_and_retryable() {
        let c = classify(Some(502), "", None);
        assert_eq!(c.kind, ErrorKind::Server);
        assert_eq!(c.severity, ErrorSeverity::High);
        assert!(c.retryable);
    }

    #[test]
    fn auth_failures_are_high_and_final() {
        for code in [401, 403] {
            let c = classify(Some(code), "", None);
            assert_eq!(c.kind, ErrorKind::Client);
            assert_eq!(c.severity, ErrorSeverity::High);
            assert!(!c.retryable);
        }
    }

    #[test]
    fn retryable_client_codes() {
        assert!(classify(Some(429), "", None).retryable);
        assert!(classify(Some(408), "", None).retryable);
        assert!(!classify(Some(404), "", None).retryable);
    }

    #[test]
    fn timeout_markers_win_over_network_markers() {
        // "abort" appears before the network scan runs.
        let c = classify(None, "request abort: ECONNRESET", None);
        assert_eq!(c.kind, ErrorKind::Timeout);
    }

    #[test]
    fn node_style_codes_are_recognized() {
        let c = classify(None, "UND_ERR_HEADERS_TIMEOUT", None);
        assert_eq!(c.kind, ErrorKind::Timeout);
        let c = classify(None, "getaddrinfo ENOTFOUND host.test", None);
        assert_eq!(c.kind, ErrorKind::Network);
        assert_eq!(c.severity, ErrorSeverity::High);
    }

    #[test]
    fn crash_bodies_are_critical() {
        let c = classify(None, "oops", Some("FATAL: out of memory"));
        assert_eq!(c.severity, ErrorSeverity::Critical);
        assert!(!c.retryable);
    }

    #[test]
    fn unknown_fallback() {
        let c = classify(None, "something odd", None);
        assert_eq!(c.kind, ErrorKind::Unknown);
        assert_eq!(c.severity, ErrorSeverity::Medium);
    }

    #[test]
    fn synthesized_codes() {
        assert_eq!(synthesized_status(ErrorKind::Timeout), Some(408));
        assert_eq!(synthesized_status(ErrorKind::Network), Some(503));
        assert_eq!(synthesized_status(ErrorKind::Client), None);
    }

    #[test]
    fn stats_keep_bounded_tail_and_counts() {
        let mut stats = ErrorStats::new();
        let class = classify(Some(500), "", None);
        for i in 0..60 {
            stats.record(&format!("https://a.test/{i}"), "boom", &class, Some(500));
        }
        assert_eq!(stats.total(), 60);
        let summary = stats.to_summary();
        assert_eq!(summary.by_kind["server"], 60);
        assert_eq!(summary.by_status_code["500"], 60);
        assert_eq!(summary.recent.len(), config::ERRORS_IN_RESPONSE);
        assert!(summary.recent.last().unwrap().url.ends_with("/59"));
    }
}
