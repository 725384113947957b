//! The per-scan session store and its process-wide registry.
//!
//! Each store holds the log ring buffer, the append-only results list, the
//! control flags, error statistics, and the performance counters that every
//! log event snapshots. Stores outlive their crawl by the configured
//! retention window, then a scheduled eviction task removes them.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::debug;

use crate::core::types::{
    ErrorSummary, LogLevel, PerformanceSnapshot, ProgressSnapshot, ScanLog, ScanResult, ScanStats,
};
use crate::errors::{Classification, ErrorStats};
use crate::session::control::ControlFlags;

/// Frontier gauges attached to a log event at emit time.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogContext<'a> {
    pub url: Option<&'a str>,
    pub details: Option<&'a str>,
    pub response_time: Option<u64>,
    pub queue_size: usize,
    pub visited_count: usize,
}

pub struct SessionStore {
    pub scan_id: String,
    pub control: ControlFlags,
    max_log_entries: usize,
    started_at: Instant,

    logs: Mutex<VecDeque<ScanLog>>,
    results: Mutex<Vec<ScanResult>>,
    errors: Mutex<ErrorStats>,
    response_times: Mutex<Vec<u64>>,
    links_found: AtomicUsize,
}

impl SessionStore {
    fn new(scan_id: String, max_log_entries: usize) -> Self {
        Self {
            scan_id,
            control: ControlFlags::new(),
            max_log_entries: max_log_entries.max(1),
            started_at: Instant::now(),
            logs: Mutex::new(VecDeque::new()),
            results: Mutex::new(Vec::new()),
            errors: Mutex::new(ErrorStats::new()),
            response_times: Mutex::new(Vec::new()),
            links_found: AtomicUsize::new(0),
        }
    }

    // ── Results ──────────────────────────────────────────────────────────────

    /// Append one result unless the page cap is already reached. Returns
    /// `false` when the result was dropped at the cap.
    pub fn append_result(&self, result: ScanResult, max_pages: usize) -> bool {
        let mut results = self.results.lock().unwrap();
        if results.len() >= max_pages {
            return false;
        }
        results.push(result);
        true
    }

    pub fn results_len(&self) -> usize {
        self.results.lock().unwrap().len()
    }

    pub fn snapshot_results(&self) -> Vec<ScanResult> {
        self.results.lock().unwrap().clone()
    }

    // ── Counters ─────────────────────────────────────────────────────────────

    pub fn add_links_found(&self, n: usize) {
        self.links_found.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_response_time(&self, ms: u64) {
        self.response_times.lock().unwrap().push(ms);
    }

    pub fn record_error(
        &self,
        url: &str,
        message: &str,
        class: &Classification,
        status: Option<u16>,
    ) {
        self.errors.lock().unwrap().record(url, message, class, status);
    }

    pub fn error_summary(&self) -> ErrorSummary {
        self.errors.lock().unwrap().to_summary()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    // ── Log ring buffer ──────────────────────────────────────────────────────

    /// Emit one structured log event with statistics, progress, and
    /// performance snapshots taken now.
    pub fn log(&self, level: LogLevel, message: impl Into<String>, ctx: LogContext<'_>) {
        let current = self.results_len();
        let total = ctx.visited_count + ctx.queue_size;
        let percentage = if total > 0 {
            (current as f64 / total as f64 * 100.0).min(100.0)
        } else {
            0.0
        };

        let average_response_time = {
            let times = self.response_times.lock().unwrap();
            if times.is_empty() {
                0
            } else {
                times.iter().sum::<u64>() / times.len() as u64
            }
        };

        let entry = ScanLog {
            level,
            message: message.into(),
            timestamp: Utc::now().to_rfc3339(),
            url: ctx.url.map(|s| s.to_string()),
            details: ctx.details.map(|s| s.to_string()),
            stats: ScanStats {
                urls_scanned: current,
                links_found: self.links_found.load(Ordering::Relaxed),
                errors: self.errors.lock().unwrap().total(),
                queue_size: ctx.queue_size,
                visited_count: ctx.visited_count,
            },
            progress: ProgressSnapshot {
                current,
                total,
                percentage,
            },
            performance: PerformanceSnapshot {
                response_time: ctx.response_time,
                elapsed_time: self.elapsed_ms(),
                average_response_time,
            },
        };

        let mut logs = self.logs.lock().unwrap();
        logs.push_back(entry);
        while logs.len() > self.max_log_entries {
            logs.pop_front();
        }
    }

    pub fn snapshot_logs(&self) -> Vec<ScanLog> {
        self.logs.lock().unwrap().iter().cloned().collect()
    }
}

/// Process-wide map of live (and recently finished) sessions.
#[derive(Default)]
pub struct SessionRegistry {
    inner: RwLock<HashMap<String, Arc<SessionStore>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the store for a new scan. Replaces any stale entry with the
    /// same id.
    pub fn create(&self, scan_id: &str, max_log_entries: usize) -> Arc<SessionStore> {
        let store = Arc::new(SessionStore::new(scan_id.to_string(), max_log_entries));
        self.inner
            .write()
            .unwrap()
            .insert(scan_id.to_string(), Arc::clone(&store));
        store
    }

    pub fn get(&self, scan_id: &str) -> Option<Arc<SessionStore>> {
        self.inner.read().unwrap().get(scan_id).cloned()
    }

    pub fn remove(&self, scan_id: &str) {
        self.inner.write().unwrap().remove(scan_id);
    }

    /// Sticky-stop every live session; used by process shutdown.
    pub fn stop_all(&self) {
        for store in self.inner.read().unwrap().values() {
            store.control.stop();
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Schedule the post-crawl eviction of a session store. The store (and
    /// its control flags) stay pollable for `ttl`, then vanish.
    pub fn schedule_eviction(self: &Arc<Self>, scan_id: &str, ttl: Duration) {
        let registry = Arc::clone(self);
        let scan_id = scan_id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            registry.remove(&scan_id);
            debug!("session store for {} evicted after retention window", scan_id);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ScanStatus;
    use crate::errors::classify;

    fn result(url: &str) -> ScanResult {
        ScanResult {
            url: url.to_string(),
            status: ScanStatus::Success,
            status_code: Some(200),
            links: vec![],
            response_body: None,
            error: None,
            error_kind: None,
            error_severity: None,
            error_retryable: None,
            suggested_action: None,
            timestamp: Utc::now().to_rfc3339(),
            depth: 0,
        }
    }

    #[test]
    fn append_respects_page_cap() {
        let store = SessionStore::new("s".into(), 100);
        assert!(store.append_result(result("https://a.test/1"), 2));
        assert!(store.append_result(result("https://a.test/2"), 2));
        assert!(!store.append_result(result("https://a.test/3"), 2));
        assert_eq!(store.results_len(), 2);
    }

    #[test]
    fn log_ring_drops_oldest() {
        let store = SessionStore::new("s".into(), 3);
        for i in 0..5 {
            store.log(LogLevel::Info, format!("event {i}"), LogContext::default());
        }
        let logs = store.snapshot_logs();
        assert_eq!(logs.len(), 3);
        assert_eq!(logs[0].message, "event 2");
        assert_eq!(logs[2].message, "event 4");
    }

    #[test]
    fn log_snapshots_carry_stats_and_progress() {
        let store = SessionStore::new("s".into(), 10);
        store.append_result(result("https://a.test/1"), 100);
        store.add_links_found(7);
        store.record_response_time(40);
        store.record_response_time(60);

        store.log(
            LogLevel::Success,
            "scanned",
            LogContext {
                url: Some("https://a.test/1"),
                response_time: Some(60),
                queue_size: 3,
                visited_count: 1,
                ..Default::default()
            },
        );

        let log = store.snapshot_logs().pop().unwrap();
        assert_eq!(log.stats.urls_scanned, 1);
        assert_eq!(log.stats.links_found, 7);
        assert_eq!(log.stats.queue_size, 3);
        assert_eq!(log.progress.current, 1);
        assert_eq!(log.progress.total, 4);
        assert_eq!(log.performance.average_response_time, 50);
        assert_eq!(log.performance.response_time, Some(60));
    }

    #[test]
    fn registry_round_trip() {
        let registry = SessionRegistry::new();
        let store = registry.create("abc", 10);
        store
            .record_error("https://a.test/x", "boom", &classify(Some(500), "", None), Some(500));
        assert_eq!(registry.get("abc").unwrap().error_summary().total, 1);
        registry.remove("abc");
        assert!(registry.get("abc").is_none());
    }

    #[tokio::test]
    async fn eviction_removes_after_ttl() {
        let registry = Arc::new(SessionRegistry::new());
        registry.create("ttl-scan", 10);
        registry.schedule_eviction("ttl-scan", Duration::from_millis(50));
        assert!(registry.get("ttl-scan").is_some());
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(registry.get("ttl-scan").is_none());
    }
}
