//! Compiled URL-literal patterns shared by both extraction backends.

use regex::Regex;

/// Regex set for mining URL tokens out of attribute values, script text, CSS,
/// comments, and visible prose. Compiled once per scan.
#[derive(Debug)]
pub struct LinkPatterns {
    /// `href = '…'`, `window.location = '…'`, `window.open('…')` and friends.
    pub onclick_assign: Regex,
    /// `fetch('…')`, `axios.get('…')`, `$.ajax('…')`, `.post('…')` and friends.
    pub js_call: Regex,
    /// Quoted string literals that look like absolute or root-relative URLs.
    pub quoted_literal: Regex,
    /// Bare `http(s)://…` tokens in free text.
    pub bare_url: Regex,
    /// CSS `url(…)`.
    pub css_url: Regex,
    /// CSS `@import '…'` / `@import url('…')`.
    pub css_import: Regex,
    /// `url=` target inside a `<meta http-equiv="refresh">` content value.
    pub meta_refresh: Regex,
}

impl LinkPatterns {
    pub fn new() -> Self {
        Self {
            onclick_assign: Regex::new(
                r#"(?i)(?:window\.location(?:\.href)?|location\.href|window\.open|location|href|url|link)\s*[=:(.]\s*['"]([^'"]+)['"]"#,
            )
            .unwrap(),
            js_call: Regex::new(
                r#"(?:fetch|axios(?:\.(?:get|post|put|delete))?|\$\.(?:ajax|get|post)|XMLHttpRequest|\.(?:get|post|put|delete))\s*\(\s*['"]([^'"]+)['"]"#,
            )
            .unwrap(),
            quoted_literal: Regex::new(r#"['"](https?://[^'"\s]+|/[^/'"\s][^'"\s]*)['"]"#).unwrap(),
            bare_url: Regex::new(r#"https?://[^\s"'<>()\\]+"#).unwrap(),
            css_url: Regex::new(r#"url\(\s*['"]?([^'")\s]+)['"]?\s*\)"#).unwrap(),
            css_import: Regex::new(r#"@import\s+(?:url\(\s*)?['"]([^'"]+)['"]"#).unwrap(),
            meta_refresh: Regex::new(r#"(?i)url\s*=\s*['"]?([^'";\s]+)"#).unwrap(),
        }
    }

    /// Strip sentence punctuation that bare-URL matches drag along.
    pub fn trim_bare(url: &str) -> &str {
        url.trim_end_matches(['.', ',', ';', ':', '!', '?', '\'', ')', ']'])
    }
}

impl Default for LinkPatterns {
    fn default() -> Self {
        Self::new()
    }
}
