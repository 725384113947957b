//! Rich fetch: full headless-browser rendering.
//!
//! Each fetch opens a fresh page context, installs the scan's headers and
//! session cookies, subscribes to network responses to learn the authoritative
//! final status, waits out dynamic content, runs the interactive reveal, and
//! walks the live DOM for links. A navigation timeout is not fatal: whatever
//! rendered is salvaged and treated as a 200.

use anyhow::{anyhow, Result};
use chromiumoxide::cdp::browser_protocol::network::{
    CookieParam, EventResponseReceived, Headers, ResourceType, SetCookiesParams,
    SetExtraHttpHeadersParams,
};
use futures::StreamExt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

use crate::extract::{collect_live_links, interactive_reveal, ExtractOptions};
use crate::fetch::browser::{wait_until_stable, ScanBrowser};
use crate::fetch::{json_embedded_urls, soft_error, FetchOutcome};

pub struct RichFetcher {
    browser: Arc<ScanBrowser>,
    opts: ExtractOptions,
    headers: Vec<(String, String)>,
    /// Session cookies from the login preamble, installed on every page.
    cookies: Vec<(String, String)>,
    timeout: Duration,
    dynamic_wait_ms: u64,
    detect_soft_errors: bool,
}

impl RichFetcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        browser: Arc<ScanBrowser>,
        opts: ExtractOptions,
        headers: Vec<(String, String)>,
        cookies: Vec<(String, String)>,
        timeout: Duration,
        dynamic_wait_ms: u64,
        detect_soft_errors: bool,
    ) -> Self {
        Self {
            browser,
            opts,
            headers,
            cookies,
            timeout,
            dynamic_wait_ms,
            detect_soft_errors,
        }
    }

    pub async fn fetch(&self, url: &Url) -> Result<FetchOutcome> {
        let started = Instant::now();
        let page = self.browser.new_page().await?;

        if !self.headers.is_empty() {
            let mut map = serde_json::Map::new();
            for (name, value) in &self.headers {
                map.insert(name.clone(), serde_json::Value::String(value.clone()));
            }
            page.execute(SetExtraHttpHeadersParams::new(Headers::new(
                serde_json::Value::Object(map),
            )))
            .await
            .map_err(|e| anyhow!("failed to install headers: {}", e))?;
        }

        if !self.cookies.is_empty() {
            let params: Vec<CookieParam> = self
                .cookies
                .iter()
                .filter_map(|(name, value)| {
                    CookieParam::builder()
                        .name(name)
                        .value(value)
                        .url(url.as_str())
                        .build()
                        .ok()
                })
                .collect();
            if let Err(e) = page.execute(SetCookiesParams::new(params)).await {
                warn!("failed to inject session cookies: {}", e);
            }
        }

        // The last response for the navigation URL wins over the initial goto
        // status; redirect chains report the landing document here.
        let nav_url = url.as_str().to_string();
        let observed: Arc<Mutex<Option<(u16, String)>>> = Arc::new(Mutex::new(None));
        let mut responses = page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(|e| anyhow!("failed to subscribe to responses: {}", e))?;
        let observed_writer = Arc::clone(&observed);
        let response_task = tokio::spawn(async move {
            while let Some(event) = responses.next().await {
                let is_document = matches!(event.r#type, ResourceType::Document);
                let matches_nav = event.response.url == nav_url
                    || event.response.url.trim_end_matches('/') == nav_url.trim_end_matches('/');
                if is_document || matches_nav {
                    let mut slot = observed_writer.lock().unwrap();
                    *slot = Some((
                        event.response.status as u16,
                        event.response.mime_type.clone(),
                    ));
                }
            }
        });

        let mut salvaged = false;
        match tokio::time::timeout(self.timeout, page.goto(url.as_str())).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                response_task.abort();
                drop(page);
                return Err(anyhow!("navigation failed: {}", e));
            }
            Err(_) => {
                // Deadline hit mid-navigation; salvage whatever rendered.
                salvaged = true;
                debug!("navigation deadline hit for {}, salvaging content", url);
            }
        }

        wait_until_stable(&page, 1_000, self.timeout.as_millis() as u64).await.ok();
        tokio::time::sleep(Duration::from_millis(self.dynamic_wait_ms)).await;

        if let Err(e) = interactive_reveal(&page, 300).await {
            debug!("interactive reveal skipped: {}", e);
        }

        let mut raw_links = collect_live_links(&page, &self.opts)
            .await
            .unwrap_or_default();

        let body = page
            .content()
            .await
            .map_err(|e| anyhow!("failed to capture page content: {}", e))?;

        let final_url = page
            .url()
            .await
            .ok()
            .flatten()
            .and_then(|u| Url::parse(&u).ok())
            .unwrap_or_else(|| url.clone());

        let (observed_status, mime_type) = observed
            .lock()
            .unwrap()
            .clone()
            .unwrap_or((200, "text/html".to_string()));
        let status = if salvaged { 200 } else { observed_status };
        let status = soft_error::correct(status, &body, self.detect_soft_errors);

        if mime_type.contains("application/json") {
            raw_links.extend(json_embedded_urls(&body));
        }

        response_task.abort();
        drop(page);

        Ok(FetchOutcome {
            status: Some(status),
            body,
            content_type: mime_type,
            final_url,
            raw_links,
            response_time_ms: started.elapsed().as_millis() as u64,
        })
    }
}
