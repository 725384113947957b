//! Pre-crawl seed discovery from sitemaps and robots.txt.
//!
//! Sitemaps are probed at their conventional locations; `<url><loc>` entries
//! become depth-0 frontier candidates, `<sitemap><loc>` children are fetched
//! in the background and enqueue as they arrive. robots.txt is mined for
//! `Sitemap:` lines and for `Disallow:` paths, which are treated as URL
//! discovery hints, not policy. Timeouts stay silent; any other failure logs
//! a single warning for the whole discovery pass.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;
use url::Url;
use xml::reader::{EventReader, XmlEvent};

use crate::core::types::LogLevel;
use crate::scan::frontier::Frontier;
use crate::scan::Admission;
use crate::session::{LogContext, SessionStore};

const SITEMAP_PATHS: &[&str] = &[
    "/sitemap.xml",
    "/sitemap_index.xml",
    "/sitemap1.xml",
    "/sitemap-index.xml",
    "/sitemaps.xml",
];

/// URLs found in one sitemap document, split into page entries and child
/// sitemap references.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SitemapContent {
    pub page_urls: Vec<String>,
    pub child_sitemaps: Vec<String>,
}

/// Pull `<url><loc>` and `<sitemap><loc>` values out of sitemap XML. The
/// parent element decides the bucket; anything else with a `loc` is ignored.
pub fn parse_sitemap(content: &str) -> SitemapContent {
    let mut out = SitemapContent::default();
    let mut stack: Vec<String> = Vec::new();

    for event in EventReader::from_str(content) {
        match event {
            Ok(XmlEvent::StartElement { name, .. }) => {
                stack.push(name.local_name.to_lowercase());
            }
            Ok(XmlEvent::Characters(text)) => {
                let n = stack.len();
                if n >= 2 && stack[n - 1] == "loc" {
                    let target = text.trim().to_string();
                    if target.is_empty() {
                        continue;
                    }
                    match stack[n - 2].as_str() {
                        "url" => out.page_urls.push(target),
                        "sitemap" => out.child_sitemaps.push(target),
                        _ => {}
                    }
                }
            }
            Ok(XmlEvent::EndElement { .. }) => {
                stack.pop();
            }
            Err(_) => break,
            _ => {}
        }
    }

    out
}

fn looks_like_sitemap_xml(content_type: &str, body: &str) -> bool {
    let head = body.trim_start();
    content_type.contains("xml")
        || head.starts_with("<?xml")
        || head.contains("<urlset")
        || head.contains("<sitemapindex")
}

struct Discovery {
    client: reqwest::Client,
    timeout: Duration,
    admission: Arc<Admission>,
    frontier: Arc<Frontier>,
    store: Arc<SessionStore>,
}

impl Discovery {
    async fn get(&self, url: &Url) -> Result<(u16, String, String), reqwest::Error> {
        let response = self
            .client
            .get(url.clone())
            .timeout(self.timeout)
            .send()
            .await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = response.text().await?;
        Ok((status, content_type, body))
    }

    /// Enqueue a raw candidate at depth 0 through the normal admission gate.
    fn enqueue(&self, raw: &str, base: &Url) -> bool {
        match self.admission.admit(raw, base) {
            Some(url) => self.frontier.push(url, 0),
            None => false,
        }
    }

    fn enqueue_sitemap_pages(&self, content: &SitemapContent, origin: &Url) -> usize {
        let mut added = 0;
        for raw in &content.page_urls {
            if self.enqueue(raw, origin) {
                added += 1;
            }
        }
        added
    }
}

/// Probe sitemaps and robots.txt, seeding the frontier at depth 0. Returns
/// the handles of background child-sitemap fetches so the scheduler can abort
/// any stragglers at termination.
pub async fn discover(
    client: reqwest::Client,
    origin: Url,
    timeout: Duration,
    admission: Arc<Admission>,
    frontier: Arc<Frontier>,
    store: Arc<SessionStore>,
) -> Vec<JoinHandle<()>> {
    let discovery = Arc::new(Discovery {
        client,
        timeout,
        admission,
        frontier,
        store,
    });
    let mut handles = Vec::new();
    let mut warned = false;

    // First responsive sitemap location wins.
    for path in SITEMAP_PATHS {
        let Ok(probe_url) = origin.join(path) else {
            continue;
        };
        match discovery.get(&probe_url).await {
            Ok((status, content_type, body))
                if (200..300).contains(&status)
                    && looks_like_sitemap_xml(&content_type, &body) =>
            {
                let content = parse_sitemap(&body);
                let added = discovery.enqueue_sitemap_pages(&content, &origin);
                debug!("sitemap {} contributed {} seed URLs", probe_url, added);
                if added > 0 {
                    discovery.store.log(
                        LogLevel::Info,
                        format!("Sitemap contributed {added} seed URLs"),
                        LogContext {
                            url: Some(probe_url.as_str()),
                            ..Default::default()
                        },
                    );
                }
                for child in content.child_sitemaps {
                    handles.push(spawn_child_fetch(Arc::clone(&discovery), origin.clone(), child));
                }
                break;
            }
            Ok(_) => {}
            Err(e) => {
                if !e.is_timeout() && !warned {
                    warned = true;
                    discovery.store.log(
                        LogLevel::Warning,
                        format!("Seed discovery fetch failed: {e}"),
                        LogContext {
                            url: Some(probe_url.as_str()),
                            ..Default::default()
                        },
                    );
                }
            }
        }
    }

    // robots.txt: Sitemap lines are followed, Disallow paths are mined as
    // candidate URLs.
    if let Ok(robots_url) = origin.join("/robots.txt") {
        match discovery.get(&robots_url).await {
            Ok((status, _, body)) if (200..300).contains(&status) => {
                for line in body.lines() {
                    let line = line.trim();
                    if let Some(target) = line
                        .strip_prefix("Sitemap:")
                        .or_else(|| line.strip_prefix("sitemap:"))
                    {
                        let target = target.trim().to_string();
                        if let Ok(sitemap_url) = Url::parse(&target) {
                            if crate::urlkit::same_origin(&sitemap_url, &origin) {
                                handles.push(spawn_child_fetch(
                                    Arc::clone(&discovery),
                                    origin.clone(),
                                    target,
                                ));
                            }
                        }
                    } else if let Some(path) = line
                        .strip_prefix("Disallow:")
                        .or_else(|| line.strip_prefix("disallow:"))
                    {
                        let path = path.trim();
                        if !path.is_empty() && path != "/" {
                            discovery.enqueue(path, &origin);
                        }
                    }
                }
            }
            Ok(_) => {}
            Err(e) => {
                if !e.is_timeout() && !warned {
                    discovery.store.log(
                        LogLevel::Warning,
                        format!("robots.txt fetch failed: {e}"),
                        LogContext::default(),
                    );
                }
            }
        }
    }

    handles
}

/// Background fire-and-forget fetch of a child sitemap; its URLs enqueue as
/// they arrive. All failures are swallowed.
fn spawn_child_fetch(discovery: Arc<Discovery>, origin: Url, sitemap_url: String) -> JoinHandle<()> {
    tokio::spawn(async move {
        let Ok(url) = Url::parse(&sitemap_url) else {
            return;
        };
        if let Ok((status, content_type, body)) = discovery.get(&url).await {
            if (200..300).contains(&status) && looks_like_sitemap_xml(&content_type, &body) {
                let content = parse_sitemap(&body);
                let added = discovery.enqueue_sitemap_pages(&content, &origin);
                debug!("child sitemap {} contributed {} URLs", url, added);
            }
        }
    })
}
