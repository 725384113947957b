//! Fetch strategies.
//!
//! One operation, two interchangeable variants: `Lite` issues a plain HTTP GET
//! and feeds the body to the static extraction backend; `Rich` renders the
//! page in a native headless Chromium and walks the live DOM. Both honor the
//! per-request deadline, thread the session cookie header, and run soft-error
//! status correction on 200 bodies.

pub mod browser;
pub mod lite;
pub mod rich;
pub mod soft_error;

pub use browser::{native_browser_available, ScanBrowser};
pub use lite::LiteFetcher;
pub use rich::RichFetcher;

use anyhow::Result;
use url::Url;

/// Output of one fetch, whichever variant produced it.
#[derive(Debug)]
pub struct FetchOutcome {
    /// Final HTTP status after redirects and soft-error correction.
    pub status: Option<u16>,
    /// Rendered or raw body text.
    pub body: String,
    pub content_type: String,
    /// URL the document actually lives at (after redirects); extraction base.
    pub final_url: Url,
    /// Raw candidate URLs from the variant's extraction backend, plus any
    /// JSON-embedded URLs and stray `Location` targets.
    pub raw_links: Vec<String>,
    pub response_time_ms: u64,
}

/// The two fetch variants behind one `fetch` operation.
pub enum FetchStrategy {
    Lite(LiteFetcher),
    Rich(RichFetcher),
}

impl FetchStrategy {
    pub async fn fetch(&self, url: &Url) -> Result<FetchOutcome> {
        match self {
            FetchStrategy::Lite(fetcher) => fetcher.fetch(url).await,
            FetchStrategy::Rich(fetcher) => fetcher.fetch(url).await,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FetchStrategy::Lite(_) => "lite",
            FetchStrategy::Rich(_) => "rich",
        }
    }
}

/// URL-like string leaves of a JSON document, in document order.
pub(crate) fn json_embedded_urls(payload: &str) -> Vec<String> {
    fn walk(value: &serde_json::Value, out: &mut Vec<String>) {
        match value {
            serde_json::Value::String(s) => {
                let s = s.trim();
                let root_relative = s.starts_with('/') && !s.starts_with("//");
                if s.starts_with("http://") || s.starts_with("https://") || root_relative {
                    out.push(s.to_string());
                }
            }
            serde_json::Value::Array(items) => items.iter().for_each(|v| walk(v, out)),
            serde_json::Value::Object(map) => map.values().for_each(|v| walk(v, out)),
            _ => {}
        }
    }

    let mut out = Vec::new();
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(payload) {
        walk(&value, &mut out);
    }
    out
}
