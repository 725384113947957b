//! HTTP form-login negotiator.
//!
//! Redirects are handled manually so `Set-Cookie` headers on every hop can be
//! merged into the jar and a 3xx `Location` can be captured as the post-login
//! start URL. A 419 response (CSRF token mismatch) triggers exactly one
//! refetch-and-retry of the whole exchange.

use anyhow::{anyhow, Result};
use reqwest::redirect::Policy;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use super::cookies::CookieJar;
use super::form::{self, LoginForm};
use crate::core::config;

#[derive(Debug)]
pub struct HttpLoginOutcome {
    pub jar: CookieJar,
    /// `Location` of the post-login redirect, when the server issued one.
    pub redirect_url: Option<String>,
    pub final_status: u16,
}

fn login_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .redirect(Policy::none())
        .gzip(true)
        .build()
        .map_err(|e| anyhow!("failed to build login client: {}", e))
}

async fn fetch_login_page(
    client: &reqwest::Client,
    login_url: &Url,
    jar: &mut CookieJar,
) -> Result<String> {
    let mut request = client.get(login_url.clone());
    for (name, value) in config::default_headers() {
        request = request.header(name, value);
    }
    if let Some(cookies) = jar.header_value() {
        request = request.header("Cookie", cookies);
    }
    let response = request
        .send()
        .await
        .map_err(|e| anyhow!("login page fetch failed: {}", e))?;
    jar.merge_response(&response);
    response
        .text()
        .await
        .map_err(|e| anyhow!("login page read failed: {}", e))
}

fn build_form_body(form: &LoginForm, username: &str, password: &str) -> HashMap<String, String> {
    let mut body = HashMap::new();
    body.insert(form.username_field.clone(), username.to_string());
    body.insert(form.password_field.clone(), password.to_string());
    if let Some(token) = &form.csrf_token {
        // Every common alias gets the same value; servers read the one they
        // know and ignore the rest.
        for alias in ["_token", "csrf_token", "authenticity_token"] {
            body.insert(alias.to_string(), token.clone());
        }
    }
    body
}

async fn post_credentials(
    client: &reqwest::Client,
    login_url: &Url,
    form: &LoginForm,
    username: &str,
    password: &str,
    jar: &mut CookieJar,
) -> Result<(u16, Option<String>)> {
    let action_url = match &form.action {
        Some(action) => login_url
            .join(action)
            .map_err(|e| anyhow!("invalid form action '{}': {}", action, e))?,
        None => login_url.clone(),
    };
    let method = reqwest::Method::from_bytes(form.method.to_uppercase().as_bytes())
        .unwrap_or(reqwest::Method::POST);

    let mut request = client.request(method, action_url.clone());
    for (name, value) in config::default_headers() {
        request = request.header(name, value);
    }
    request = request
        .header("Referer", login_url.as_str())
        .header("Origin", login_url.origin().ascii_serialization());
    if let Some(cookies) = jar.header_value() {
        request = request.header("Cookie", cookies);
    }
    if let Some(token) = &form.csrf_token {
        request = request
            .header("X-XSRF-TOKEN", token.as_str())
            .header("X-CSRF-TOKEN", token.as_str());
    }

    let body = build_form_body(form, username, password);
    request = if form.json_body {
        request.json(&body)
    } else {
        request.form(&body)
    };

    let response = request
        .send()
        .await
        .map_err(|e| anyhow!("credential post failed: {}", e))?;
    let status = response.status().as_u16();
    jar.merge_response(&response);

    let redirect = if response.status().is_redirection() {
        response
            .headers()
            .get("location")
            .and_then(|v| v.to_str().ok())
            .and_then(|loc| action_url.join(loc).ok())
            .map(|u| u.to_string())
    } else {
        None
    };

    Ok((status, redirect))
}

/// Run the full exchange: token discovery, credential post, cookie merge,
/// and the single CSRF retry.
pub async fn login(
    login_url: &Url,
    username: &str,
    password: &str,
    username_field: Option<&str>,
    password_field: Option<&str>,
    timeout: Duration,
) -> Result<HttpLoginOutcome> {
    let client = login_client(timeout)?;
    let mut jar = CookieJar::new();

    let page = fetch_login_page(&client, login_url, &mut jar).await?;
    let form = form::discover(&page, username_field, password_field, &jar);
    debug!(
        "login form: action={:?} method={} user_field={} csrf={}",
        form.action,
        form.method,
        form.username_field,
        form.csrf_token.is_some()
    );

    let (mut status, mut redirect) =
        post_credentials(&client, login_url, &form, username, password, &mut jar).await?;

    if status == 419 {
        // Token went stale between page fetch and post; refresh and retry once.
        info!("419 from login post, refreshing CSRF token and retrying once");
        let page = fetch_login_page(&client, login_url, &mut jar).await?;
        let form = form::discover(&page, username_field, password_field, &jar);
        let retried =
            post_credentials(&client, login_url, &form, username, password, &mut jar).await?;
        status = retried.0;
        redirect = retried.1;
    }

    Ok(HttpLoginOutcome {
        jar,
        redirect_url: redirect,
        final_status: status,
    })
}
