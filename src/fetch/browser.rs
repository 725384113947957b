//! Native headless browser management via `chromiumoxide`.
//!
//! Single source of truth for finding a usable Chromium-family executable,
//! launching one browser process per scan session, and tearing it down when
//! the scheduler finishes. Workers open a fresh page per URL so concurrent
//! scans never share a page context.

use anyhow::{anyhow, Result};
use chromiumoxide::browser::BrowserConfig;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Find a usable Chromium-family browser executable.
///
/// Resolution order:
/// 1. `CHROME_EXECUTABLE` env var (works great in Docker:
///    `CHROME_EXECUTABLE=/usr/bin/chromium`)
/// 2. PATH scan, which finds package-manager installs on all platforms.
/// 3. OS-specific well-known install paths.
pub fn find_chrome_executable() -> Option<String> {
    if let Ok(p) = std::env::var("CHROME_EXECUTABLE") {
        if Path::new(&p).exists() {
            return Some(p);
        }
    }

    if let Ok(path_var) = std::env::var("PATH") {
        let candidates = [
            "google-chrome",
            "chromium",
            "chromium-browser",
            "chrome",
            "brave-browser",
            "brave",
        ];
        for dir in std::env::split_paths(&path_var) {
            for exe in candidates {
                let full = dir.join(exe);
                if full.exists() {
                    return Some(full.to_string_lossy().to_string());
                }
            }
        }
    }

    #[cfg(target_os = "macos")]
    {
        let candidates = [
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
        ];
        for c in candidates {
            if Path::new(c).exists() {
                return Some(c.to_string());
            }
        }
    }

    #[cfg(target_os = "linux")]
    {
        let candidates = [
            "/usr/bin/google-chrome",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/usr/bin/brave-browser",
            "/usr/local/bin/chromium",
        ];
        for c in candidates {
            if Path::new(c).exists() {
                return Some(c.to_string());
            }
        }
    }

    #[cfg(target_os = "windows")]
    {
        let candidates = [
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files\BraveSoftware\Brave-Browser\Application\brave.exe",
            r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
        ];
        for c in candidates {
            if Path::new(c).exists() {
                return Some(c.to_string());
            }
        }
    }

    None
}

/// True when a usable browser binary is present on this machine.
pub fn native_browser_available() -> bool {
    find_chrome_executable().is_some()
}

/// Headless flags chosen for Docker/CI compatibility and stability.
fn build_headless_config(exe: &str, width: u32, height: u32) -> Result<BrowserConfig> {
    BrowserConfig::builder()
        .chrome_executable(exe)
        .viewport(Viewport {
            width,
            height,
            device_scale_factor: Some(1.0),
            emulating_mobile: false,
            is_landscape: true,
            has_touch: false,
        })
        .window_size(width, height)
        .arg("--disable-gpu")
        .arg("--no-sandbox") // required in Docker / CI environments
        .arg("--disable-setuid-sandbox")
        .arg("--disable-dev-shm-usage") // avoids /dev/shm OOM in Docker
        .arg("--disable-extensions")
        .arg("--disable-background-networking")
        .arg("--disable-sync")
        .arg("--disable-translate")
        .arg("--disable-crash-reporter")
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--hide-scrollbars")
        .arg("--mute-audio")
        .build()
        .map_err(|e| anyhow!("Failed to build browser config: {}", e))
}

/// One browser process per scan session, closed when the scheduler
/// terminates. Pages are opened per worker scan and dropped afterwards.
pub struct ScanBrowser {
    browser: tokio::sync::Mutex<Option<Browser>>,
    handler_task: JoinHandle<()>,
}

impl ScanBrowser {
    pub async fn launch() -> Result<Self> {
        let exe = find_chrome_executable().ok_or_else(|| {
            anyhow!(
                "No browser found. Install Chrome or Chromium, or set CHROME_EXECUTABLE."
            )
        })?;

        info!("🌐 Launching headless browser: {}", exe);
        let config = build_headless_config(&exe, 1280, 900)?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| anyhow!("Failed to launch browser ({}): {}", exe, e))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    error!("CDP handler error: {}", e);
                }
            }
        });

        Ok(Self {
            browser: tokio::sync::Mutex::new(Some(browser)),
            handler_task,
        })
    }

    /// Fresh page context for one worker scan.
    pub async fn new_page(&self) -> Result<Page> {
        let guard = self.browser.lock().await;
        let browser = guard
            .as_ref()
            .ok_or_else(|| anyhow!("browser already closed"))?;
        browser
            .new_page("about:blank")
            .await
            .map_err(|e| anyhow!("Failed to open page: {}", e))
    }

    /// Best-effort teardown; a close error never shadows scan results.
    /// Idempotent, so a shutdown path racing the scan's own cleanup is fine.
    pub async fn close(&self) {
        if let Some(mut browser) = self.browser.lock().await.take() {
            if let Err(e) = browser.close().await {
                warn!("Browser close error (non-fatal): {}", e);
            }
        }
        self.handler_task.abort();
    }
}

/// Wait until the rendered document stops changing (a practical stand-in for
/// network idle): polls the serialized content length every 250 ms and
/// returns once it holds still for `quiet_ms`, or after `max_ms` regardless.
pub async fn wait_until_stable(page: &Page, quiet_ms: u64, max_ms: u64) -> Result<()> {
    let started = Instant::now();
    let mut last_len = 0usize;
    let mut stable_since = Instant::now();

    loop {
        if started.elapsed() >= Duration::from_millis(max_ms) {
            return Ok(());
        }
        let len = page
            .content()
            .await
            .map(|c| c.len())
            .unwrap_or(last_len);
        if len != last_len {
            last_len = len;
            stable_since = Instant::now();
        } else if stable_since.elapsed() >= Duration::from_millis(quiet_ms) {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
}
