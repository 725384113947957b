use regex::RegexBuilder;
use url::Url;

/// Path extensions that mark a URL as a static asset.
const STATIC_EXTENSIONS: &[&str] = &[
    // scripts & styles
    ".js", ".mjs", ".css", ".scss", ".less", ".map",
    // images
    ".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp", ".ico", ".bmp", ".avif",
    // fonts
    ".woff", ".woff2", ".ttf", ".otf", ".eot",
    // media
    ".mp4", ".mp3", ".wav", ".avi", ".mov", ".webm", ".ogg", ".flac", ".mkv",
    // archives
    ".zip", ".tar", ".gz", ".rar", ".7z", ".bz2",
    // documents
    ".pdf", ".doc", ".docx", ".xls", ".xlsx", ".ppt", ".pptx", ".csv",
    // binaries
    ".exe", ".dmg", ".apk", ".wasm",
];

/// Well-known static directory segments.
const STATIC_DIR_SEGMENTS: &[&str] = &[
    "/static/",
    "/assets/",
    "/public/",
    "/_next/static/",
    "/dist/",
    "/build/",
    "/fonts/",
    "/images/",
    "/img/",
    "/media/",
    "/vendor/",
];

/// Hostname prefixes that mark a whole host as asset-serving.
const STATIC_HOST_PREFIXES: &[&str] = &["cdn.", "static.", "assets.", "media."];

/// True when the URL's extension, directory, or host marks it as non-HTML
/// content that should never be scanned.
pub fn is_static_asset(u: &Url) -> bool {
    let path = u.path().to_lowercase();

    if STATIC_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
        return true;
    }
    if STATIC_DIR_SEGMENTS.iter().any(|seg| path.contains(seg)) {
        return true;
    }
    if let Some(host) = u.host_str() {
        let host = host.to_lowercase();
        if STATIC_HOST_PREFIXES.iter().any(|p| host.starts_with(p)) {
            return true;
        }
    }
    false
}

/// Compiled `pathRegexFilter`.
///
/// Empty or absent pattern matches everything; a pattern that fails to
/// compile matches nothing (so no discovered link passes the filter).
#[derive(Debug, Clone)]
pub enum PathFilter {
    MatchAll,
    MatchNone,
    Pattern(regex::Regex),
}

impl PathFilter {
    pub fn new(pattern: Option<&str>) -> Self {
        match pattern.map(str::trim) {
            None | Some("") => PathFilter::MatchAll,
            Some(p) => match RegexBuilder::new(p).case_insensitive(true).build() {
                Ok(re) => PathFilter::Pattern(re),
                Err(_) => PathFilter::MatchNone,
            },
        }
    }

    /// Apply to the URL path only.
    pub fn matches(&self, u: &Url) -> bool {
        match self {
            PathFilter::MatchAll => true,
            PathFilter::MatchNone => false,
            PathFilter::Pattern(re) => re.is_match(u.path()),
        }
    }
}
