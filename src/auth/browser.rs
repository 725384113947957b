//! Browser form-login path.
//!
//! Drives the real login page: auto-detects the credential fields with the
//! same selector heuristics as the HTTP path, types with a small per-keystroke
//! delay, submits, waits for the post-login navigation, and snapshots the
//! resulting cookies.

use anyhow::{anyhow, Result};
use chromiumoxide::Page;
use std::time::Duration;
use tracing::debug;

use super::cookies::CookieJar;
use crate::fetch::ScanBrowser;

const KEYSTROKE_DELAY_MS: u64 = 35;

#[derive(Debug)]
pub struct BrowserLoginOutcome {
    pub jar: CookieJar,
    /// URL the browser landed on after submitting.
    pub landed_url: Option<String>,
}

async fn find_first(page: &Page, selectors: &[String]) -> Option<chromiumoxide::Element> {
    for selector in selectors {
        if let Ok(el) = page.find_element(selector.as_str()).await {
            return Some(el);
        }
    }
    None
}

async fn type_slowly(el: &chromiumoxide::Element, text: &str) -> Result<()> {
    el.click().await.map_err(|e| anyhow!("field click failed: {}", e))?;
    for ch in text.chars() {
        el.type_str(ch.to_string())
            .await
            .map_err(|e| anyhow!("typing failed: {}", e))?;
        tokio::time::sleep(Duration::from_millis(KEYSTROKE_DELAY_MS)).await;
    }
    Ok(())
}

pub async fn login(
    browser: &ScanBrowser,
    login_url: &str,
    username: &str,
    password: &str,
    username_field: Option<&str>,
    password_field: Option<&str>,
    timeout: Duration,
) -> Result<BrowserLoginOutcome> {
    let page = browser.new_page().await?;

    tokio::time::timeout(timeout, page.goto(login_url))
        .await
        .map_err(|_| anyhow!("login page navigation timed out"))?
        .map_err(|e| anyhow!("login page navigation failed: {}", e))?;
    tokio::time::sleep(Duration::from_millis(800)).await;

    let mut username_selectors = Vec::new();
    if let Some(field) = username_field {
        username_selectors.push(format!("input[name=\"{field}\"]"));
        username_selectors.push(format!("#{field}"));
    }
    username_selectors.extend(
        [
            "input[type=\"email\"]",
            "input[name*=\"user\"]",
            "input[id*=\"user\"]",
            "input[name*=\"login\"]",
            "input[id*=\"login\"]",
            "input[type=\"text\"]",
        ]
        .map(String::from),
    );

    let mut password_selectors = Vec::new();
    if let Some(field) = password_field {
        password_selectors.push(format!("input[name=\"{field}\"]"));
    }
    password_selectors.push("input[type=\"password\"]".to_string());

    let user_el = find_first(&page, &username_selectors)
        .await
        .ok_or_else(|| anyhow!("no username field found on login page"))?;
    type_slowly(&user_el, username).await?;

    let pass_el = find_first(&page, &password_selectors)
        .await
        .ok_or_else(|| anyhow!("no password field found on login page"))?;
    type_slowly(&pass_el, password).await?;

    // Click a submit control; fall back to Enter in the password field.
    let submit_selectors = [
        "button[type=\"submit\"]".to_string(),
        "input[type=\"submit\"]".to_string(),
        "form button".to_string(),
    ];
    if let Some(submit) = find_first(&page, &submit_selectors).await {
        submit
            .click()
            .await
            .map_err(|e| anyhow!("submit click failed: {}", e))?;
    } else {
        debug!("no submit control found, pressing Enter");
        pass_el
            .press_key("Enter")
            .await
            .map_err(|e| anyhow!("enter key failed: {}", e))?;
    }

    tokio::time::timeout(timeout, page.wait_for_navigation())
        .await
        .ok();
    tokio::time::sleep(Duration::from_millis(800)).await;

    let mut jar = CookieJar::new();
    for cookie in page
        .get_cookies()
        .await
        .map_err(|e| anyhow!("cookie snapshot failed: {}", e))?
    {
        jar.insert(&cookie.name, &cookie.value);
    }

    let landed_url = page.url().await.ok().flatten();
    drop(page);

    Ok(BrowserLoginOutcome { jar, landed_url })
}
