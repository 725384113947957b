//! End-to-end crawl scenarios against a mock origin.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use sitescan::{scan_website, session, AppState, ScanConfig, ScanStatus};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/html; charset=utf-8")
        .set_body_string(body.to_string())
}

async fn mock_page(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(html(body))
        .mount(server)
        .await;
}

fn config_for(server: &MockServer) -> ScanConfig {
    let mut cfg = ScanConfig::for_url(&server.uri());
    cfg.max_concurrent = 2;
    cfg.timeout_ms = 3_000;
    cfg
}

fn result_urls(results: &[sitescan::ScanResult]) -> Vec<&str> {
    results.iter().map(|r| r.url.as_str()).collect()
}

// ── Scenario: single static page ─────────────────────────────────────────────

#[tokio::test]
async fn single_static_page_crawl() {
    let server = MockServer::start().await;
    mock_page(
        &server,
        "/",
        r#"<a href="/about">a</a><a href="https://other.test/">x</a>"#,
    )
    .await;
    mock_page(&server, "/about", "<p>about us</p>").await;

    let state = AppState::default();
    let response = scan_website(&state, config_for(&server)).await.unwrap();

    assert_eq!(response.results.len(), 2);
    for r in &response.results {
        assert_eq!(r.status, ScanStatus::Success);
        assert_eq!(r.status_code, Some(200));
    }

    let root = response
        .results
        .iter()
        .find(|r| r.depth == 0)
        .expect("seed result");
    assert_eq!(root.links, vec![format!("{}/about", server.uri())]);

    let about = response
        .results
        .iter()
        .find(|r| r.url.ends_with("/about"))
        .expect("about result");
    assert!(about.links.is_empty());
    assert_eq!(about.depth, 1);

    // Cross-origin URL never became a result.
    assert!(!result_urls(&response.results)
        .iter()
        .any(|u| u.contains("other.test")));

    // A URL is scanned at most once.
    let unique: HashSet<_> = response.results.iter().map(|r| &r.url).collect();
    assert_eq!(unique.len(), response.results.len());
}

// ── Scenario: soft 404 ───────────────────────────────────────────────────────

#[tokio::test]
async fn soft_404_overwrites_status() {
    let server = MockServer::start().await;
    mock_page(&server, "/missing", "<h1>404 Not Found</h1>").await;

    let state = AppState::default();
    let mut cfg = config_for(&server);
    cfg.url = format!("{}/missing", server.uri());
    let response = scan_website(&state, cfg).await.unwrap();

    assert_eq!(response.results.len(), 1);
    let r = &response.results[0];
    assert_eq!(r.status_code, Some(404));
    assert_eq!(r.status, ScanStatus::Error);
    let body = r.response_body.as_deref().expect("error body kept");
    assert!(body.contains("404 Not Found"));
    assert!(body.chars().count() <= 1000);
    assert_eq!(r.error_kind, Some(sitescan::ErrorKind::Client));
    assert_eq!(r.error_severity, Some(sitescan::ErrorSeverity::Medium));
}

#[tokio::test]
async fn soft_error_detection_can_be_disabled() {
    let server = MockServer::start().await;
    mock_page(&server, "/post", "<h1>Understanding 404 not found pages</h1>").await;

    let state = AppState::default();
    let mut cfg = config_for(&server);
    cfg.url = format!("{}/post", server.uri());
    cfg.detect_soft_errors = false;
    let response = scan_website(&state, cfg).await.unwrap();

    assert_eq!(response.results[0].status_code, Some(200));
    assert_eq!(response.results[0].status, ScanStatus::Success);
}

// ── Scenario: static-asset filter ────────────────────────────────────────────

#[tokio::test]
async fn static_assets_are_never_scanned_or_reported() {
    let server = MockServer::start().await;
    mock_page(&server, "/", r#"<a href="/x.css">c</a><a href="/p">p</a>"#).await;
    mock_page(&server, "/p", "<p>page</p>").await;

    let state = AppState::default();
    let response = scan_website(&state, config_for(&server)).await.unwrap();

    let urls = result_urls(&response.results);
    assert!(urls.iter().any(|u| u.ends_with("/p")));
    assert!(!urls.iter().any(|u| u.ends_with("/x.css")));
    for r in &response.results {
        assert!(!r.links.iter().any(|l| l.ends_with("/x.css")));
    }
}

// ── Scenario: login with CSRF retry ──────────────────────────────────────────

#[tokio::test]
async fn login_csrf_retry_then_authenticated_crawl() {
    let server = MockServer::start().await;

    let login_page = |token: &str| {
        format!(
            r#"<form action="/session" method="post">
                <input type="hidden" name="_token" value="{token}">
                <input type="text" name="username">
                <input type="password" name="password">
            </form>"#
        )
    };

    // First login-page fetch exposes T1; the refetch after 419 exposes T2.
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(html(&login_page("T1")).insert_header("set-cookie", "pre=1; Path=/"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(html(&login_page("T2")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/session"))
        .and(body_string_contains("_token=T1"))
        .respond_with(ResponseTemplate::new(419))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/session"))
        .and(body_string_contains("_token=T2"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("set-cookie", "session=authed; Path=/; HttpOnly")
                .insert_header("location", "/dashboard"),
        )
        .mount(&server)
        .await;

    // The dashboard only answers when the merged cookie header arrives.
    Mock::given(method("GET"))
        .and(path("/dashboard"))
        .and(header("Cookie", "pre=1; session=authed"))
        .respond_with(html("<h1>Dashboard</h1><a href=\"/reports\">r</a>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/reports"))
        .and(header("Cookie", "pre=1; session=authed"))
        .respond_with(html("<p>reports</p>"))
        .mount(&server)
        .await;

    let state = AppState::default();
    let mut cfg = config_for(&server);
    cfg.login_url = Some(format!("{}/login", server.uri()));
    cfg.username = Some("admin".to_string());
    cfg.password = Some("secret".to_string());

    let response = scan_website(&state, cfg).await.unwrap();

    let urls = result_urls(&response.results);
    assert!(urls.iter().any(|u| u.ends_with("/dashboard")));
    assert!(urls.iter().any(|u| u.ends_with("/reports")));
    for r in &response.results {
        assert_eq!(r.status, ScanStatus::Success, "failed: {}", r.url);
    }
}

// ── Scenario: pause / resume / stop ──────────────────────────────────────────

#[tokio::test]
async fn pause_freezes_and_stop_finalizes() {
    let server = MockServer::start().await;
    let links: String = (0..40)
        .map(|i| format!("<a href=\"/page/{i}\">p{i}</a>"))
        .collect();
    mock_page(&server, "/", &links).await;
    for i in 0..40 {
        Mock::given(method("GET"))
            .and(path(format!("/page/{i}")))
            .respond_with(
                html("<p>leaf</p>").set_delay(Duration::from_millis(60)),
            )
            .mount(&server)
            .await;
    }

    let state = Arc::new(AppState::default());
    let mut cfg = config_for(&server);
    cfg.scan_id = Some("pause-test".to_string());

    let scan_task = {
        let state = Arc::clone(&state);
        tokio::spawn(async move { scan_website(&state, cfg).await })
    };

    // Wait for some progress, then pause.
    let mut observed = 0;
    for _ in 0..100 {
        observed = session::get_scan_results(&state, "pause-test").len();
        if observed >= 5 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(observed >= 5, "scan never made progress");

    let ack = session::pause_scan(&state, "pause-test").unwrap();
    assert!(ack.success);

    // Let in-flight workers settle, then the count must hold still.
    tokio::time::sleep(Duration::from_millis(300)).await;
    let frozen = session::get_scan_results(&state, "pause-test").len();
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(
        session::get_scan_results(&state, "pause-test").len(),
        frozen,
        "results grew while paused"
    );

    // Resume briefly, then stop for good.
    session::resume_scan(&state, "pause-test").unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    session::stop_scan(&state, "pause-test").unwrap();

    let response = scan_task.await.unwrap().unwrap();
    assert!(response.results.len() <= 41);
    assert!(response
        .logs
        .iter()
        .any(|l| l.message == "Scan stopped by user"));
}

// ── Scenario: path regex filter ──────────────────────────────────────────────

#[tokio::test]
async fn path_regex_filter_gates_discovered_links() {
    let server = MockServer::start().await;
    mock_page(
        &server,
        "/",
        r#"<a href="/admin/x">a</a><a href="/public/y">b</a><a href="/api/v1/z">c</a>"#,
    )
    .await;
    mock_page(&server, "/admin/x", "<p>admin</p>").await;
    mock_page(&server, "/api/v1/z", "<p>api</p>").await;
    mock_page(&server, "/public/y", "<p>public</p>").await;

    let state = AppState::default();
    let mut cfg = config_for(&server);
    cfg.path_regex_filter = Some("/admin|/api".to_string());
    let response = scan_website(&state, cfg).await.unwrap();

    let urls = result_urls(&response.results);
    // Seed was in the frontier before filtering applies to discovered links.
    assert!(urls.iter().any(|u| u.ends_with("/")));
    assert!(urls.iter().any(|u| u.ends_with("/admin/x")));
    assert!(urls.iter().any(|u| u.ends_with("/api/v1/z")));
    assert!(!urls.iter().any(|u| u.ends_with("/public/y")));
}

#[tokio::test]
async fn invalid_path_regex_blocks_all_discovery() {
    let server = MockServer::start().await;
    mock_page(&server, "/", r#"<a href="/next">n</a>"#).await;
    mock_page(&server, "/next", "<p>next</p>").await;

    let state = AppState::default();
    let mut cfg = config_for(&server);
    cfg.path_regex_filter = Some("(unclosed".to_string());
    let response = scan_website(&state, cfg).await.unwrap();

    // Only the seed is scanned; nothing passes the broken filter.
    assert_eq!(response.results.len(), 1);
    assert!(response.results[0].links.is_empty());
}

// ── Boundary: page cap ───────────────────────────────────────────────────────

#[tokio::test]
async fn max_pages_one_yields_exactly_one_result() {
    let server = MockServer::start().await;
    mock_page(&server, "/", r#"<a href="/a">a</a><a href="/b">b</a>"#).await;
    mock_page(&server, "/a", "<p>a</p>").await;
    mock_page(&server, "/b", "<p>b</p>").await;

    let state = AppState::default();
    let mut cfg = config_for(&server);
    cfg.max_pages = 1;
    let response = scan_website(&state, cfg).await.unwrap();

    assert_eq!(response.results.len(), 1);
}

// ── Seed discovery ───────────────────────────────────────────────────────────

#[tokio::test]
async fn sitemap_and_robots_contribute_seeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/xml")
                .set_body_string(format!(
                    r#"<?xml version="1.0"?><urlset>
                       <url><loc>{0}/from-sitemap</loc></url>
                       <url><loc>https://other.test/ignored</loc></url>
                       </urlset>"#,
                    server.uri()
                )),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("User-agent: *\nDisallow: /hidden\n"),
        )
        .mount(&server)
        .await;
    mock_page(&server, "/", "<p>home</p>").await;
    mock_page(&server, "/from-sitemap", "<p>sm</p>").await;
    mock_page(&server, "/hidden", "<p>hidden</p>").await;

    let state = AppState::default();
    let response = scan_website(&state, config_for(&server)).await.unwrap();

    let urls = result_urls(&response.results);
    assert!(urls.iter().any(|u| u.ends_with("/from-sitemap")));
    assert!(urls.iter().any(|u| u.ends_with("/hidden")));
    assert!(!urls.iter().any(|u| u.contains("other.test")));

    // Sitemap-contributed URLs are depth-0 seeds.
    let sm = response
        .results
        .iter()
        .find(|r| r.url.ends_with("/from-sitemap"))
        .unwrap();
    assert_eq!(sm.depth, 0);
}

// ── Error classification on real failures ────────────────────────────────────

#[tokio::test]
async fn hard_http_errors_are_classified_and_summarized() {
    let server = MockServer::start().await;
    mock_page(
        &server,
        "/",
        r#"<a href="/boom">b</a><a href="/gone">g</a>"#,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/boom"))
        .respond_with(ResponseTemplate::new(500).set_body_string("exploded"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_string("nope"))
        .mount(&server)
        .await;

    let state = AppState::default();
    let response = scan_website(&state, config_for(&server)).await.unwrap();

    let boom = response
        .results
        .iter()
        .find(|r| r.url.ends_with("/boom"))
        .unwrap();
    assert_eq!(boom.error_kind, Some(sitescan::ErrorKind::Server));
    assert_eq!(boom.error_retryable, Some(true));
    assert_eq!(boom.response_body.as_deref(), Some("exploded"));

    let summary = &response.error_summary;
    assert_eq!(summary.total, 2);
    assert_eq!(summary.by_kind.get("server"), Some(&1));
    assert_eq!(summary.by_kind.get("client"), Some(&1));
    assert_eq!(summary.by_status_code.get("500"), Some(&1));
    assert_eq!(summary.recent.len(), 2);
}

// ── Streaming sink behavior ──────────────────────────────────────────────────

#[tokio::test]
async fn logs_respect_ring_capacity_and_carry_snapshots() {
    let server = MockServer::start().await;
    let links: String = (0..10)
        .map(|i| format!("<a href=\"/n/{i}\">n</a>"))
        .collect();
    mock_page(&server, "/", &links).await;
    for i in 0..10 {
        Mock::given(method("GET"))
            .and(path(format!("/n/{i}")))
            .respond_with(html("<p>n</p>"))
            .mount(&server)
            .await;
    }

    let state = AppState::default();
    let mut cfg = config_for(&server);
    cfg.max_log_entries = 5;
    let response = scan_website(&state, cfg).await.unwrap();

    assert!(response.logs.len() <= 5);
    let last = response.logs.last().unwrap();
    assert_eq!(last.stats.urls_scanned, response.results.len());
    assert!(last.performance.elapsed_time > 0);
}

#[tokio::test]
async fn unknown_scan_polls_are_empty_and_controls_fail() {
    let state = AppState::default();
    assert!(session::get_scan_logs(&state, "ghost").is_empty());
    assert!(session::get_scan_results(&state, "ghost").is_empty());
    assert!(session::pause_scan(&state, "ghost").is_err());
    assert!(session::stop_scan(&state, "ghost").is_err());
}

// ── Custom headers ───────────────────────────────────────────────────────────

#[tokio::test]
async fn custom_headers_reach_the_wire() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("X-Probe", "sitescan"))
        .and(header("User-Agent", "OverrideAgent/1.0"))
        .respond_with(html("<p>ok</p>"))
        .mount(&server)
        .await;

    let state = AppState::default();
    let mut cfg = config_for(&server);
    cfg.custom_headers
        .insert("X-Probe".to_string(), "sitescan".to_string());
    cfg.custom_headers
        .insert("User-Agent".to_string(), "OverrideAgent/1.0".to_string());
    let response = scan_website(&state, cfg).await.unwrap();

    assert_eq!(response.results[0].status_code, Some(200));
}
