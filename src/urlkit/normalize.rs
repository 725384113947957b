use url::Url;

/// Resolve `href` against `base` and canonicalize it for crawl identity.
///
/// Returns `None` for empty/whitespace refs, refs starting with an excluded
/// scheme, and refs that fail to parse. On success the fragment and the query
/// string are cleared.
pub fn normalize(href: &str, base: &Url, excluded_protocols: &[String]) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }

    let href_lc = href.to_lowercase();
    if excluded_protocols
        .iter()
        .any(|proto| href_lc.starts_with(&proto.to_lowercase()))
    {
        return None;
    }

    let mut resolved = base.join(href).ok()?;
    if resolved.scheme() != "http" && resolved.scheme() != "https" {
        return None;
    }
    resolved.set_fragment(None);
    resolved.set_query(None);
    Some(resolved)
}

/// Hostname-only origin check, case-insensitive. Scheme and port are not
/// compared.
pub fn same_origin(u: &Url, base: &Url) -> bool {
    match (u.host_str(), base.host_str()) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::default_excluded_protocols;

    fn base() -> Url {
        Url::parse("https://example.test/dir/page").unwrap()
    }

    #[test]
    fn resolves_relative_refs() {
        let u = normalize("../about", &base(), &default_excluded_protocols()).unwrap();
        assert_eq!(u.as_str(), "https://example.test/about");
    }

    #[test]
    fn strips_fragment_and_query() {
        let u = normalize("/p?x=1&y=2#frag", &base(), &default_excluded_protocols()).unwrap();
        assert_eq!(u.as_str(), "https://example.test/p");
    }

    #[test]
    fn fragment_only_ref_normalizes_to_base_path() {
        let u = normalize("#section", &base(), &default_excluded_protocols()).unwrap();
        assert_eq!(u.as_str(), "https://example.test/dir/page");
    }

    #[test]
    fn rejects_excluded_schemes() {
        let excluded = default_excluded_protocols();
        for href in [
            "javascript:void(0)",
            "MAILTO:x@y.test",
            "tel:+8490000000",
            "data:text/plain,hi",
            "blob:https://example.test/abc",
        ] {
            assert!(normalize(href, &base(), &excluded).is_none(), "{href}");
        }
    }

    #[test]
    fn rejects_empty_and_whitespace() {
        let excluded = default_excluded_protocols();
        assert!(normalize("", &base(), &excluded).is_none());
        assert!(normalize("   \t", &base(), &excluded).is_none());
    }

    #[test]
    fn rejects_non_http_results() {
        let excluded = default_excluded_protocols();
        assert!(normalize("ftp://example.test/file", &base(), &excluded).is_none());
    }

    #[test]
    fn normalize_is_idempotent() {
        let excluded = default_excluded_protocols();
        let once = normalize("/a/b?q=1#f", &base(), &excluded).unwrap();
        let twice = normalize(once.as_str(), &base(), &excluded).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn same_origin_ignores_scheme_port_and_case() {
        let b = Url::parse("http://Example.test/").unwrap();
        assert!(same_origin(
            &Url::parse("https://example.TEST:8443/x").unwrap(),
            &b
        ));
        assert!(!same_origin(&Url::parse("https://other.test/").unwrap(), &b));
    }
}
