//! Engine defaults and environment fallbacks.
//!
//! `ScanConfig` is the per-scan contract; everything here is the process-wide
//! baseline it falls back to. All env lookups are best-effort: a missing or
//! unparseable variable falls through to the compiled default.

use std::env;

// ── Crawl bounds ─────────────────────────────────────────────────────────────

pub const DEFAULT_MAX_DEPTH: usize = 3;
pub const DEFAULT_MAX_PAGES: usize = 100;
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_MAX_CONCURRENT: usize = 5;

// ── Session store ────────────────────────────────────────────────────────────

pub const DEFAULT_MAX_LOG_ENTRIES: usize = 1_000;
pub const DEFAULT_LOG_RETENTION_MINUTES: u64 = 5;

// ── Scheduler timing ─────────────────────────────────────────────────────────

/// Cadence of the pause/stop poll inside `wait_if_paused`.
pub const PAUSE_POLL_INTERVAL_MS: u64 = 100;
/// Anti-stall timer: with free slots and a non-empty frontier, the coordinator
/// re-checks the queue after this long even if no worker has finished.
pub const ANTI_STALL_TIMER_MS: u64 = 2_000;
/// Empty-slot iterations with an unchanged queue before a stuck-queue warning.
pub const STUCK_QUEUE_ITERATIONS: u32 = 10;

// ── Fetch / rendering ────────────────────────────────────────────────────────

pub const DEFAULT_DYNAMIC_CONTENT_WAIT_MS: u64 = 1_500;
/// Stored body prefix for non-2xx responses.
pub const RESPONSE_BODY_PREFIX_CHARS: usize = 1_000;

// ── Error summary ────────────────────────────────────────────────────────────

/// Recent-error tail kept in the aggregate summary.
pub const ERROR_TAIL_CAP: usize = 50;
/// Recent errors included in the final RPC response.
pub const ERRORS_IN_RESPONSE: usize = 20;

/// Browser-like default User-Agent, used unless `customHeaders` overrides it.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/126.0.0.0 Safari/537.36";

/// Default request headers merged under `customHeaders` (custom wins).
pub fn default_headers() -> Vec<(&'static str, &'static str)> {
    vec![
        ("User-Agent", DEFAULT_USER_AGENT),
        (
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        ),
        ("Accept-Language", "en-US,en;q=0.9,vi;q=0.8"),
    ]
}

/// Schemes the normalizer rejects outright.
pub fn default_excluded_protocols() -> Vec<String> {
    ["javascript:", "mailto:", "tel:", "data:", "blob:"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

// ── Process-level env fallbacks (transport binary) ───────────────────────────

pub fn http_timeout_secs() -> u64 {
    env::var("HTTP_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(30)
}

pub fn http_connect_timeout_secs() -> u64 {
    env::var("HTTP_CONNECT_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(10)
}

pub fn port_from_env() -> Option<u16> {
    for k in ["SITESCAN_PORT", "PORT"] {
        if let Ok(v) = env::var(k) {
            if let Ok(p) = v.trim().parse::<u16>() {
                return Some(p);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_headers_carry_browser_user_agent() {
        let headers = default_headers();
        let ua = headers
            .iter()
            .find(|(k, _)| *k == "User-Agent")
            .map(|(_, v)| *v)
            .unwrap();
        assert!(ua.starts_with("Mozilla/5.0"));
    }

    #[test]
    fn excluded_protocols_cover_the_dangerous_schemes() {
        let protos = default_excluded_protocols();
        for p in ["javascript:", "mailto:", "tel:", "data:", "blob:"] {
            assert!(protos.iter().any(|x| x == p), "missing {p}");
        }
    }
}
