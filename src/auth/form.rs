//! Login-form discovery: CSRF token, field names, action/method/enctype.

use scraper::{Html, Selector};

use super::cookies::CookieJar;

/// Everything the negotiator needs to post credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginForm {
    /// Form action, relative or absolute; `None` means post back to the
    /// login URL itself.
    pub action: Option<String>,
    /// Lowercased form method; defaults to `post`.
    pub method: String,
    /// True when the form's enctype mentions JSON.
    pub json_body: bool,
    pub username_field: String,
    pub password_field: String,
    pub csrf_token: Option<String>,
}

/// CSRF discovery order: hidden inputs, then meta tags, then the XSRF cookie.
fn discover_csrf(document: &Html, jar: &CookieJar) -> Option<String> {
    for name in ["_token", "csrf_token", "authenticity_token"] {
        let selector = format!("input[name=\"{name}\"]");
        let parsed = Selector::parse(&selector);
        if let Ok(sel) = parsed {
            if let Some(el) = document.select(&sel).next() {
                if let Some(value) = el.value().attr("value") {
                    if !value.is_empty() {
                        return Some(value.to_string());
                    }
                }
            }
        }
    }

    for name in ["csrf-token", "_token"] {
        let selector = format!("meta[name=\"{name}\"]");
        let parsed = Selector::parse(&selector);
        if let Ok(sel) = parsed {
            if let Some(el) = document.select(&sel).next() {
                if let Some(content) = el.value().attr("content") {
                    if !content.is_empty() {
                        return Some(content.to_string());
                    }
                }
            }
        }
    }

    jar.get("XSRF-TOKEN").map(|v| v.to_string())
}

fn attr_hints_user(el: &scraper::node::Element) -> bool {
    for attr in ["name", "id"] {
        if let Some(v) = el.attr(attr) {
            let v = v.to_lowercase();
            if v.contains("user") || v.contains("login") {
                return true;
            }
        }
    }
    false
}

/// Discover the login form on a fetched login page.
///
/// Operator-supplied field names always win over auto-detection. The form
/// element itself is the first one containing a password input, falling back
/// to the first form on the page.
pub fn discover(
    html: &str,
    username_override: Option<&str>,
    password_override: Option<&str>,
    jar: &CookieJar,
) -> LoginForm {
    let document = Html::parse_document(html);

    let csrf_token = discover_csrf(&document, jar);

    let username_field = username_override.map(|s| s.to_string()).or_else(|| {
        let sel = Selector::parse("input[type=\"text\"], input[type=\"email\"]").ok()?;
        document
            .select(&sel)
            .find(|el| attr_hints_user(el.value()))
            .and_then(|el| el.value().attr("name").map(|n| n.to_string()))
    });

    let password_field = password_override.map(|s| s.to_string()).or_else(|| {
        let sel = Selector::parse("input[type=\"password\"]").ok()?;
        document
            .select(&sel)
            .next()
            .and_then(|el| el.value().attr("name").map(|n| n.to_string()))
    });

    // The form carrying the password input is the login form.
    let form_el = Selector::parse("form").ok().and_then(|form_sel| {
        let password_sel = Selector::parse("input[type=\"password\"]").ok()?;
        let forms: Vec<_> = document.select(&form_sel).collect();
        forms
            .iter()
            .find(|f| f.select(&password_sel).next().is_some())
            .or_else(|| forms.first())
            .copied()
    });

    let action = form_el
        .and_then(|f| f.value().attr("action"))
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty());
    let method = form_el
        .and_then(|f| f.value().attr("method"))
        .map(|m| m.trim().to_lowercase())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| "post".to_string());
    let json_body = form_el
        .and_then(|f| f.value().attr("enctype"))
        .map(|e| e.to_lowercase().contains("json"))
        .unwrap_or(false);

    LoginForm {
        action,
        method,
        json_body,
        username_field: username_field.unwrap_or_else(|| "username".to_string()),
        password_field: password_field.unwrap_or_else(|| "password".to_string()),
        csrf_token,
    }
}
