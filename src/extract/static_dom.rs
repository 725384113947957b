//! Static extraction backend: parsed-HTML walk over the full link catalogue.
//!
//! Output is a deduplicated list of raw URL tokens in first-encountered order.
//! Nothing here normalizes or filters; that happens downstream against the
//! page's base URL.

use scraper::{Html, Node, Selector};
use std::collections::HashSet;
use url::Url;

use super::patterns::LinkPatterns;
use super::ExtractOptions;

/// Attribute-name fragments that mark a `data-*` attribute as URL-bearing.
const DATA_ATTR_HINTS: &[&str] = &["href", "url", "link", "action", "path", "route"];

/// JSON-capable `<script type>` values.
const JSON_SCRIPT_TYPES: &[&str] = &["application/ld+json", "application/json"];

/// `<link rel>` values worth following.
const LINK_RELS: &[&str] = &[
    "canonical",
    "manifest",
    "prefetch",
    "preload",
    "dns-prefetch",
    "prerender",
];

/// Order-preserving deduplicating URL collector.
struct Collector {
    seen: HashSet<String>,
    out: Vec<String>,
}

impl Collector {
    fn new() -> Self {
        Self {
            seen: HashSet::new(),
            out: Vec::new(),
        }
    }

    fn push(&mut self, raw: &str) {
        let token = raw.trim();
        if token.is_empty() {
            return;
        }
        if self.seen.insert(token.to_string()) {
            self.out.push(token.to_string());
        }
    }
}

pub struct StaticExtractor {
    patterns: LinkPatterns,
    opts: ExtractOptions,
}

impl StaticExtractor {
    pub fn new(opts: ExtractOptions) -> Self {
        Self {
            patterns: LinkPatterns::new(),
            opts,
        }
    }

    /// Run the full catalogue over `html`. `base` is the document URL, needed
    /// only for the same-origin gate on `<script src>`.
    pub fn extract(&self, html: &str, base: &Url) -> Vec<String> {
        let document = Html::parse_document(html);
        let mut found = Collector::new();

        self.anchors(&document, &mut found);
        if self.opts.data_attributes {
            self.data_attributes(&document, &mut found);
        }
        if self.opts.onclick {
            self.onclick_handlers(&document, &mut found);
        }
        if self.opts.forms {
            self.form_actions(&document, &mut found);
        }
        self.inline_scripts(&document, &mut found);
        self.inline_styles(&document, &mut found);
        self.media_sources(&document, &mut found);
        self.json_scripts(&document, &mut found);
        self.comments(&document, &mut found);
        self.meta_and_links(&document, &mut found);
        if self.opts.interactive {
            self.interactive_elements(&document, &mut found);
        }
        self.same_origin_script_src(&document, base, &mut found);
        self.visible_text(&document, &mut found);

        found.out
    }

    fn anchors(&self, document: &Html, found: &mut Collector) {
        if let Ok(sel) = Selector::parse("a") {
            for el in document.select(&sel) {
                for attr in ["href", "data-href", "data-url"] {
                    if let Some(v) = el.value().attr(attr) {
                        found.push(v);
                    }
                }
            }
        }
    }

    /// Any element with a `data-*` attribute whose name hints at a URL.
    fn data_attributes(&self, document: &Html, found: &mut Collector) {
        if let Ok(sel) = Selector::parse("*") {
            for el in document.select(&sel) {
                for (name, value) in el.value().attrs() {
                    if let Some(rest) = name.strip_prefix("data-") {
                        if DATA_ATTR_HINTS.iter().any(|h| rest.contains(h)) {
                            found.push(value);
                        }
                    }
                }
            }
        }
    }

    fn onclick_handlers(&self, document: &Html, found: &mut Collector) {
        if let Ok(sel) = Selector::parse("[onclick]") {
            for el in document.select(&sel) {
                if let Some(code) = el.value().attr("onclick") {
                    self.scan_script_text(code, found);
                }
            }
        }
    }

    fn form_actions(&self, document: &Html, found: &mut Collector) {
        if let Ok(sel) = Selector::parse("form[action]") {
            for el in document.select(&sel) {
                if let Some(action) = el.value().attr("action") {
                    found.push(action);
                }
            }
        }
    }

    /// URL literals inside inline `<script>` bodies (non-JSON types).
    fn inline_scripts(&self, document: &Html, found: &mut Collector) {
        if let Ok(sel) = Selector::parse("script:not([src])") {
            for el in document.select(&sel) {
                let script_type = el.value().attr("type").unwrap_or("");
                if JSON_SCRIPT_TYPES.contains(&script_type) {
                    continue;
                }
                let code = el.text().collect::<String>();
                self.scan_script_text(&code, found);
            }
        }
    }

    fn scan_script_text(&self, code: &str, found: &mut Collector) {
        for cap in self.patterns.onclick_assign.captures_iter(code) {
            found.push(&cap[1]);
        }
        for cap in self.patterns.js_call.captures_iter(code) {
            found.push(&cap[1]);
        }
        for cap in self.patterns.quoted_literal.captures_iter(code) {
            found.push(&cap[1]);
        }
        for m in self.patterns.bare_url.find_iter(code) {
            found.push(LinkPatterns::trim_bare(m.as_str()));
        }
    }

    /// `<style>` bodies and inline `style=` attributes: `url(…)` + `@import`.
    fn inline_styles(&self, document: &Html, found: &mut Collector) {
        if let Ok(sel) = Selector::parse("style") {
            for el in document.select(&sel) {
                let css = el.text().collect::<String>();
                self.scan_css_text(&css, found);
            }
        }
        if let Ok(sel) = Selector::parse("[style]") {
            for el in document.select(&sel) {
                if let Some(css) = el.value().attr("style") {
                    self.scan_css_text(css, found);
                }
            }
        }
    }

    fn scan_css_text(&self, css: &str, found: &mut Collector) {
        for cap in self.patterns.css_url.captures_iter(css) {
            found.push(&cap[1]);
        }
        for cap in self.patterns.css_import.captures_iter(css) {
            found.push(&cap[1]);
        }
    }

    fn media_sources(&self, document: &Html, found: &mut Collector) {
        let attr_selectors = [
            ("img[srcset]", "srcset"),
            ("source[src]", "src"),
            ("source[srcset]", "srcset"),
            ("video[poster]", "poster"),
            ("object[data]", "data"),
            ("embed[src]", "src"),
        ];
        for (selector, attr) in attr_selectors {
            if let Ok(sel) = Selector::parse(selector) {
                for el in document.select(&sel) {
                    if let Some(value) = el.value().attr(attr) {
                        if attr == "srcset" {
                            for candidate in value.split(',') {
                                if let Some(u) = candidate.trim().split_whitespace().next() {
                                    found.push(u);
                                }
                            }
                        } else {
                            found.push(value);
                        }
                    }
                }
            }
        }
    }

    /// Walk JSON script payloads for URL-like string leaves.
    fn json_scripts(&self, document: &Html, found: &mut Collector) {
        for script_type in JSON_SCRIPT_TYPES {
            let selector = format!("script[type=\"{script_type}\"]");
            let parsed = Selector::parse(&selector);
            if let Ok(sel) = parsed {
                for el in document.select(&sel) {
                    let payload = el.text().collect::<String>();
                    if let Ok(value) = serde_json::from_str::<serde_json::Value>(&payload) {
                        walk_json(&value, found);
                    }
                }
            }
        }
    }

    fn comments(&self, document: &Html, found: &mut Collector) {
        for node in document.tree.nodes() {
            if let Node::Comment(comment) = node.value() {
                let text: &str = comment;
                for m in self.patterns.bare_url.find_iter(text) {
                    found.push(LinkPatterns::trim_bare(m.as_str()));
                }
                for cap in self.patterns.quoted_literal.captures_iter(text) {
                    found.push(&cap[1]);
                }
            }
        }
    }

    fn meta_and_links(&self, document: &Html, found: &mut Collector) {
        if let Ok(sel) = Selector::parse("meta[property], meta[name]") {
            for el in document.select(&sel) {
                let key = el
                    .value()
                    .attr("property")
                    .or_else(|| el.value().attr("name"))
                    .unwrap_or("");
                if matches!(
                    key,
                    "og:url" | "og:image" | "twitter:url" | "twitter:image"
                ) {
                    if let Some(content) = el.value().attr("content") {
                        found.push(content);
                    }
                }
            }
        }

        if let Ok(sel) = Selector::parse("link[rel][href]") {
            for el in document.select(&sel) {
                let rel = el.value().attr("rel").unwrap_or("").to_lowercase();
                let wanted = rel
                    .split_whitespace()
                    .any(|r| LINK_RELS.contains(&r) && (r != "canonical" || self.opts.canonical));
                if wanted {
                    if let Some(href) = el.value().attr("href") {
                        found.push(href);
                    }
                }
            }
        }

        if self.opts.meta_refresh {
            if let Ok(sel) = Selector::parse("meta[http-equiv]") {
                for el in document.select(&sel) {
                    let equiv = el.value().attr("http-equiv").unwrap_or("");
                    if equiv.eq_ignore_ascii_case("refresh") {
                        if let Some(content) = el.value().attr("content") {
                            for cap in self.patterns.meta_refresh.captures_iter(content) {
                                found.push(&cap[1]);
                            }
                        }
                    }
                }
            }
        }
    }

    fn interactive_elements(&self, document: &Html, found: &mut Collector) {
        if let Ok(sel) = Selector::parse("button") {
            for el in document.select(&sel) {
                for (name, value) in el.value().attrs() {
                    if name.starts_with("data-") {
                        if let Some(rest) = name.strip_prefix("data-") {
                            if DATA_ATTR_HINTS.iter().any(|h| rest.contains(h)) {
                                found.push(value);
                            }
                        }
                    }
                }
                if let Some(code) = el.value().attr("onclick") {
                    self.scan_script_text(code, found);
                }
            }
        }

        if let Ok(sel) = Selector::parse("[role=\"button\"], [role=\"link\"]") {
            for el in document.select(&sel) {
                for (name, value) in el.value().attrs() {
                    if let Some(rest) = name.strip_prefix("data-") {
                        if DATA_ATTR_HINTS.iter().any(|h| rest.contains(h)) {
                            found.push(value);
                        }
                    }
                }
            }
        }

        for (selector, attr) in [("area[href]", "href"), ("base[href]", "href")] {
            if let Ok(sel) = Selector::parse(selector) {
                for el in document.select(&sel) {
                    if let Some(v) = el.value().attr(attr) {
                        found.push(v);
                    }
                }
            }
        }
    }

    /// `<script src>` is included only when it points back into the same
    /// origin as the current document. `<iframe src>` stays excluded.
    fn same_origin_script_src(&self, document: &Html, base: &Url, found: &mut Collector) {
        if let Ok(sel) = Selector::parse("script[src]") {
            for el in document.select(&sel) {
                if let Some(src) = el.value().attr("src") {
                    if let Ok(resolved) = base.join(src.trim()) {
                        let same = match (resolved.host_str(), base.host_str()) {
                            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
                            _ => false,
                        };
                        if same {
                            found.push(src);
                        }
                    }
                }
            }
        }
    }

    /// Bare URLs in visible text nodes (outside script/style).
    fn visible_text(&self, document: &Html, found: &mut Collector) {
        for node in document.tree.nodes() {
            if let Node::Text(text) = node.value() {
                let parent_is_code = node
                    .parent()
                    .and_then(|p| match p.value() {
                        Node::Element(el) => Some(matches!(el.name(), "script" | "style")),
                        _ => None,
                    })
                    .unwrap_or(false);
                if parent_is_code {
                    continue;
                }
                let text: &str = text;
                for m in self.patterns.bare_url.find_iter(text) {
                    found.push(LinkPatterns::trim_bare(m.as_str()));
                }
            }
        }
    }
}

fn walk_json(value: &serde_json::Value, found: &mut Collector) {
    match value {
        serde_json::Value::String(s) => {
            let s = s.trim();
            let root_relative = s.starts_with('/') && !s.starts_with("//");
            if s.starts_with("http://") || s.starts_with("https://") || root_relative {
                found.push(s);
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                walk_json(item, found);
            }
        }
        serde_json::Value::Object(map) => {
            for item in map.values() {
                walk_json(item, found);
            }
        }
        _ => {}
    }
}
