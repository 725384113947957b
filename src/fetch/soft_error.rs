//! Soft-error detection: error pages served with a literal 200.
//!
//! When enabled, a 200 whose lowercased body matches one of the pattern
//! families below gets its status overwritten. Tie order is 404, then 403,
//! then 500, then 401; the first applicable family wins. The 404 family
//! additionally requires an anchor substring so a page that merely says
//! "not found anything? try search" does not flip on pattern noise alone.

use regex::RegexSet;

struct SoftErrorRule {
    overwrite_to: u16,
    patterns: &'static [&'static str],
    /// When non-empty, the body must also contain one of these substrings.
    anchors: &'static [&'static str],
}

const RULES: &[SoftErrorRule] = &[
    SoftErrorRule {
        overwrite_to: 404,
        patterns: &[
            r"\b404\b",
            r"not found",
            r"page not found",
            r"trang không tồn tại",
            r"không tìm thấy",
            r"page does not exist",
            r"không tồn tại",
        ],
        anchors: &["404", "not found", "không tìm thấy"],
    },
    SoftErrorRule {
        overwrite_to: 403,
        patterns: &[
            r"\b403\b",
            r"forbidden",
            r"access denied",
            r"permission denied",
            r"không có quyền",
            r"bị cấm",
        ],
        anchors: &[],
    },
    SoftErrorRule {
        overwrite_to: 500,
        patterns: &[
            r"\b500\b",
            r"internal server error",
            r"server error",
            r"lỗi máy chủ",
        ],
        anchors: &[],
    },
    SoftErrorRule {
        overwrite_to: 401,
        patterns: &[
            r"\b401\b",
            r"unauthorized",
            r"authentication required",
            r"chưa đăng nhập",
        ],
        anchors: &[],
    },
];

/// Corrected status for a nominal-200 body, or `None` when the body looks
/// like real content.
pub fn detect(body: &str) -> Option<u16> {
    let body_lc = body.to_lowercase();
    for rule in RULES {
        let set = RegexSet::new(rule.patterns).ok()?;
        if !set.is_match(&body_lc) {
            continue;
        }
        if !rule.anchors.is_empty() && !rule.anchors.iter().any(|a| body_lc.contains(a)) {
            continue;
        }
        return Some(rule.overwrite_to);
    }
    None
}

/// Apply correction to a fetched status when enabled and the status is
/// literally 200.
pub fn correct(status: u16, body: &str, enabled: bool) -> u16 {
    if enabled && status == 200 {
        if let Some(corrected) = detect(body) {
            return corrected;
        }
    }
    status
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn soft_404_english() {
        assert_eq!(detect("<h1>404 Not Found</h1>"), Some(404));
        assert_eq!(detect("<h1>Page Not Found</h1>"), Some(404));
    }

    #[test]
    fn soft_404_vietnamese() {
        assert_eq!(detect("<p>Trang không tồn tại. Không tìm thấy.</p>"), Some(404));
    }

    #[test]
    fn soft_403_is_unconditional_on_match() {
        assert_eq!(detect("Access Denied"), Some(403));
        assert_eq!(detect("Bạn không có quyền truy cập"), Some(403));
    }

    #[test]
    fn soft_500_and_401() {
        assert_eq!(detect("Internal Server Error"), Some(500));
        assert_eq!(detect("Lỗi máy chủ"), Some(500));
        assert_eq!(detect("Authentication required"), Some(401));
        assert_eq!(detect("Bạn chưa đăng nhập"), Some(401));
    }

    #[test]
    fn tie_order_prefers_404() {
        // Mentions both families; 404 rule is applied first.
        assert_eq!(detect("404 not found, forbidden area"), Some(404));
    }

    #[test]
    fn clean_pages_pass() {
        assert_eq!(detect("<h1>Pricing</h1><p>All plans include support.</p>"), None);
    }

    #[test]
    fn correct_only_touches_200() {
        assert_eq!(correct(200, "404 not found", true), 404);
        assert_eq!(correct(301, "404 not found", true), 301);
        assert_eq!(correct(200, "404 not found", false), 200);
        assert_eq!(correct(200, "hello", true), 200);
    }
}
