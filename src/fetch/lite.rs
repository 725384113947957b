//! Lite fetch: plain HTTP GET plus static HTML parsing.

use anyhow::{anyhow, Result};
use std::time::{Duration, Instant};
use url::Url;

use crate::extract::StaticExtractor;
use crate::fetch::{json_embedded_urls, soft_error, FetchOutcome};

pub struct LiteFetcher {
    client: reqwest::Client,
    extractor: StaticExtractor,
    /// Default browser-like headers merged under the scan's custom headers.
    headers: Vec<(String, String)>,
    /// Serialized session cookie header, when the login preamble produced one.
    cookie_header: Option<String>,
    timeout: Duration,
    detect_soft_errors: bool,
}

impl LiteFetcher {
    pub fn new(
        client: reqwest::Client,
        extractor: StaticExtractor,
        headers: Vec<(String, String)>,
        cookie_header: Option<String>,
        timeout: Duration,
        detect_soft_errors: bool,
    ) -> Self {
        Self {
            client,
            extractor,
            headers,
            cookie_header,
            timeout,
            detect_soft_errors,
        }
    }

    pub async fn fetch(&self, url: &Url) -> Result<FetchOutcome> {
        let started = Instant::now();

        let mut request = self
            .client
            .get(url.clone())
            .timeout(self.timeout);
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(cookies) = &self.cookie_header {
            request = request.header("Cookie", cookies.as_str());
        }

        // Label the failure class explicitly; the error display alone does
        // not always carry it through the wrapper chain.
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                anyhow!("request timeout after {}ms: {}", self.timeout.as_millis(), e)
            } else if e.is_connect() {
                anyhow!("network connect error: {}", e)
            } else {
                anyhow!("request failed: {}", e)
            }
        })?;

        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("text/html")
            .to_string();

        // Some stacks expose a Location header on an already-followed
        // response; its target still counts as a discovered URL.
        let stray_location = response
            .headers()
            .get("location")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body = response
            .text()
            .await
            .map_err(|e| anyhow!("failed to read response body: {}", e))?;

        let status = soft_error::correct(status, &body, self.detect_soft_errors);

        let mut raw_links = if content_type.contains("application/json") {
            json_embedded_urls(&body)
        } else {
            self.extractor.extract(&body, &final_url)
        };
        if let Some(location) = stray_location {
            raw_links.push(location);
        }

        Ok(FetchOutcome {
            status: Some(status),
            body,
            content_type,
            final_url,
            raw_links,
            response_time_ms: started.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ExtractOptions;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(cookie: Option<String>) -> LiteFetcher {
        LiteFetcher::new(
            reqwest::Client::new(),
            StaticExtractor::new(ExtractOptions::default()),
            vec![("User-Agent".into(), "Mozilla/5.0 test".into())],
            cookie,
            Duration::from_secs(5),
            true,
        )
    }

    #[tokio::test]
    async fn fetches_html_and_extracts_links() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string(r#"<a href="/about">a</a>"#),
            )
            .mount(&server)
            .await;

        let url = Url::parse(&server.uri()).unwrap();
        let outcome = fetcher(None).fetch(&url).await.unwrap();
        assert_eq!(outcome.status, Some(200));
        assert_eq!(outcome.raw_links, vec!["/about"]);
    }

    #[tokio::test]
    async fn sends_session_cookies() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/private"))
            .and(header("Cookie", "session=tok123"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/private", server.uri())).unwrap();
        let outcome = fetcher(Some("session=tok123".into()))
            .fetch(&url)
            .await
            .unwrap();
        assert_eq!(outcome.status, Some(200));
    }

    #[tokio::test]
    async fn corrects_soft_404() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string("<h1>404 Not Found</h1>"),
            )
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/missing", server.uri())).unwrap();
        let outcome = fetcher(None).fetch(&url).await.unwrap();
        assert_eq!(outcome.status, Some(404));
    }

    #[tokio::test]
    async fn mines_json_bodies_for_urls() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/json")
                    .set_body_string(r#"{"self":"/api","next":"/api/page/2"}"#),
            )
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/api", server.uri())).unwrap();
        let outcome = fetcher(None).fetch(&url).await.unwrap();
        assert_eq!(outcome.raw_links, vec!["/api", "/api/page/2"]);
    }

    #[tokio::test]
    async fn times_out_against_slow_servers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200).set_delay(Duration::from_secs(30)),
            )
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/slow", server.uri())).unwrap();
        let fetcher = LiteFetcher::new(
            reqwest::Client::new(),
            StaticExtractor::new(ExtractOptions::default()),
            vec![],
            None,
            Duration::from_millis(200),
            true,
        );
        let err = fetcher.fetch(&url).await.unwrap_err();
        assert!(err.to_string().to_lowercase().contains("timed out")
            || err.to_string().to_lowercase().contains("timeout"));
    }
}
