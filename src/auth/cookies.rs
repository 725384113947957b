//! Session cookie jar: an ordered name→value map serialized at request time.

use percent_encoding::percent_decode_str;

/// Cookies accumulated across the login exchange. Last write wins by name;
/// insertion order is preserved for header serialization.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    entries: Vec<(String, String)>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn insert(&mut self, name: &str, value: &str) {
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| n == name) {
            entry.1 = value.to_string();
        } else {
            self.entries.push((name.to_string(), value.to_string()));
        }
    }

    /// Merge one `Set-Cookie` header value. Only the leading `name=value`
    /// pair matters; attributes after the first `;` are dropped. Values are
    /// URL-decoded, matching how frameworks like Laravel encode XSRF tokens.
    pub fn merge_set_cookie(&mut self, header_value: &str) {
        let pair = header_value.split(';').next().unwrap_or("");
        if let Some((name, value)) = pair.split_once('=') {
            let name = name.trim();
            if name.is_empty() {
                return;
            }
            let decoded = percent_decode_str(value.trim())
                .decode_utf8()
                .map(|v| v.to_string())
                .unwrap_or_else(|_| value.trim().to_string());
            self.insert(name, &decoded);
        }
    }

    /// Merge every `Set-Cookie` header on a response.
    pub fn merge_response(&mut self, response: &reqwest::Response) {
        for value in response.headers().get_all("set-cookie") {
            if let Ok(v) = value.to_str() {
                self.merge_set_cookie(v);
            }
        }
    }

    /// `Cookie:` header value, or `None` when the jar is empty.
    pub fn header_value(&self) -> Option<String> {
        if self.entries.is_empty() {
            return None;
        }
        Some(
            self.entries
                .iter()
                .map(|(n, v)| format!("{n}={v}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    pub fn pairs(&self) -> Vec<(String, String)> {
        self.entries.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_leading_pair_only() {
        let mut jar = CookieJar::new();
        jar.merge_set_cookie("session=abc123; Path=/; HttpOnly; SameSite=Lax");
        assert_eq!(jar.get("session"), Some("abc123"));
        assert_eq!(jar.header_value().as_deref(), Some("session=abc123"));
    }

    #[test]
    fn url_decodes_values() {
        let mut jar = CookieJar::new();
        jar.merge_set_cookie("XSRF-TOKEN=eyJpdiI6%3D%3D; Path=/");
        assert_eq!(jar.get("XSRF-TOKEN"), Some("eyJpdiI6=="));
    }

    #[test]
    fn last_write_wins_preserving_order() {
        let mut jar = CookieJar::new();
        jar.merge_set_cookie("a=1");
        jar.merge_set_cookie("b=2");
        jar.merge_set_cookie("a=3");
        assert_eq!(jar.header_value().as_deref(), Some("a=3; b=2"));
    }

    #[test]
    fn ignores_malformed_headers() {
        let mut jar = CookieJar::new();
        jar.merge_set_cookie("definitely not a cookie");
        jar.merge_set_cookie("=orphan");
        assert!(jar.is_empty());
    }
}
