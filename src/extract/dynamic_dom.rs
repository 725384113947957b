//! Dynamic extraction backend: live-DOM walk through CDP.
//!
//! Before extraction the page gets an interactive reveal pass (scrolling,
//! toggle clicks, hover events) so lazily-rendered content exists in the DOM
//! when the catalogue runs. Both scripts run inside the page; the collector
//! returns a JSON array of raw URL strings.

use anyhow::{anyhow, Result};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::Page;
use std::time::Duration;
use tracing::debug;

use super::ExtractOptions;

/// Reveal pass: smooth scroll top to bottom in viewport increments, jump to
/// mid and back to top, horizontal scroll when the document is wider than the
/// viewport, click the first few of each interactive trigger family, and
/// dispatch `mouseenter` on tooltip-bearing elements.
const REVEAL_SCRIPT: &str = r#"
(async () => {
    const sleep = (ms) => new Promise((r) => setTimeout(r, ms));
    const vh = window.innerHeight || 800;
    const vw = window.innerWidth || 1280;
    const docH = Math.max(document.body ? document.body.scrollHeight : 0,
                          document.documentElement.scrollHeight);
    const docW = Math.max(document.body ? document.body.scrollWidth : 0,
                          document.documentElement.scrollWidth);

    // Vertical sweep in viewport-sized steps.
    for (let y = 0; y < docH; y += vh) {
        window.scrollTo({ top: y, behavior: 'smooth' });
        await sleep(250);
    }
    window.scrollTo({ top: docH / 2, behavior: 'smooth' });
    await sleep(250);
    window.scrollTo({ top: 0, behavior: 'smooth' });
    await sleep(250);

    // Horizontal sweep only when something overflows.
    if (docW > vw) {
        for (let x = 0; x < docW; x += vw) {
            window.scrollTo({ left: x, behavior: 'smooth' });
            await sleep(200);
        }
        window.scrollTo({ left: 0 });
    }

    const clickFirst = async (selector, limit) => {
        const els = Array.from(document.querySelectorAll(selector)).slice(0, limit);
        for (const el of els) {
            try { el.click(); await sleep(150); } catch (e) { /* detached nodes */ }
        }
    };

    await clickFirst('.dropdown-toggle, [data-toggle="dropdown"], [aria-haspopup="true"]', 3);
    await clickFirst('[role="tab"], [data-toggle="tab"], [data-tab]', 3);
    await clickFirst('[data-toggle="collapse"], [data-accordion], .accordion-toggle, [aria-expanded="false"]', 3);

    const loadMoreWords = ['load more', 'show more', 'xem thêm', 'tải thêm'];
    const buttons = Array.from(document.querySelectorAll('button, a, [role="button"]'))
        .filter((el) => {
            const t = (el.textContent || '').trim().toLowerCase();
            return loadMoreWords.some((w) => t.includes(w));
        })
        .slice(0, 3);
    for (const btn of buttons) {
        try { btn.click(); await sleep(300); } catch (e) { /* ignore */ }
    }

    const hoverTargets = Array.from(
        document.querySelectorAll('[title], [data-tooltip], [data-tip], .tooltip-trigger')
    ).slice(0, 10);
    for (const el of hoverTargets) {
        try {
            el.dispatchEvent(new MouseEvent('mouseenter', { bubbles: true }));
        } catch (e) { /* ignore */ }
    }

    return true;
})()
"#;

/// Live-DOM version of the extraction catalogue. Toggle placeholders are
/// substituted before evaluation; the script returns an array of raw strings
/// deduplicated in first-encountered order.
const COLLECT_SCRIPT: &str = r#"
(() => {
    const INCLUDE_DATA = __INCLUDE_DATA__;
    const INCLUDE_ONCLICK = __INCLUDE_ONCLICK__;
    const INCLUDE_FORMS = __INCLUDE_FORMS__;
    const INCLUDE_META_REFRESH = __INCLUDE_META_REFRESH__;
    const INCLUDE_CANONICAL = __INCLUDE_CANONICAL__;
    const INCLUDE_INTERACTIVE = __INCLUDE_INTERACTIVE__;

    const seen = new Set();
    const out = [];
    const push = (raw) => {
        if (!raw) return;
        const token = String(raw).trim();
        if (!token || seen.has(token)) return;
        seen.add(token);
        out.push(token);
    };

    const ASSIGN_RE = /(?:window\.location(?:\.href)?|location\.href|window\.open|location|href|url|link)\s*[=:(.]\s*['"]([^'"]+)['"]/gi;
    const CALL_RE = /(?:fetch|axios(?:\.(?:get|post|put|delete))?|\$\.(?:ajax|get|post)|XMLHttpRequest|\.(?:get|post|put|delete))\s*\(\s*['"]([^'"]+)['"]/g;
    const QUOTED_RE = /['"](https?:\/\/[^'"\s]+|\/[^\/'"\s][^'"\s]*)['"]/g;
    const BARE_RE = /https?:\/\/[^\s"'<>()\\]+/g;
    const CSS_URL_RE = /url\(\s*['"]?([^'")\s]+)['"]?\s*\)/g;
    const CSS_IMPORT_RE = /@import\s+(?:url\(\s*)?['"]([^'"]+)['"]/g;
    const REFRESH_RE = /url\s*=\s*['"]?([^'";\s]+)/i;
    const DATA_HINTS = ['href', 'url', 'link', 'action', 'path', 'route'];

    const trimBare = (u) => u.replace(/[.,;:!?'\)\]]+$/, '');
    const scanScript = (code) => {
        if (!code) return;
        let m;
        for (const re of [ASSIGN_RE, CALL_RE, QUOTED_RE]) {
            re.lastIndex = 0;
            while ((m = re.exec(code)) !== null) push(m[1]);
        }
        BARE_RE.lastIndex = 0;
        while ((m = BARE_RE.exec(code)) !== null) push(trimBare(m[0]));
    };
    const scanCss = (css) => {
        if (!css) return;
        let m;
        for (const re of [CSS_URL_RE, CSS_IMPORT_RE]) {
            re.lastIndex = 0;
            while ((m = re.exec(css)) !== null) push(m[1]);
        }
    };
    const urlBearingData = (el) => {
        for (const attr of el.attributes || []) {
            if (!attr.name.startsWith('data-')) continue;
            const rest = attr.name.slice(5);
            if (DATA_HINTS.some((h) => rest.includes(h))) push(attr.value);
        }
    };

    // Anchors.
    for (const a of document.querySelectorAll('a')) {
        push(a.getAttribute('href'));
        push(a.getAttribute('data-href'));
        push(a.getAttribute('data-url'));
    }

    // URL-bearing data-* attributes anywhere.
    if (INCLUDE_DATA) {
        for (const el of document.querySelectorAll('*')) urlBearingData(el);
    }

    // onclick handlers anywhere.
    if (INCLUDE_ONCLICK) {
        for (const el of document.querySelectorAll('[onclick]')) {
            scanScript(el.getAttribute('onclick'));
        }
    }

    // Form actions.
    if (INCLUDE_FORMS) {
        for (const f of document.querySelectorAll('form[action]')) {
            push(f.getAttribute('action'));
        }
    }

    // Inline scripts and JSON payloads.
    for (const s of document.querySelectorAll('script:not([src])')) {
        const type = s.getAttribute('type') || '';
        if (type === 'application/ld+json' || type === 'application/json') {
            try {
                const walk = (v) => {
                    if (typeof v === 'string') {
                        if (/^https?:\/\//.test(v) || /^\/[^\/]/.test(v)) push(v);
                    } else if (Array.isArray(v)) {
                        v.forEach(walk);
                    } else if (v && typeof v === 'object') {
                        Object.values(v).forEach(walk);
                    }
                };
                walk(JSON.parse(s.textContent || 'null'));
            } catch (e) { /* malformed payload */ }
        } else {
            scanScript(s.textContent);
        }
    }

    // Styles.
    for (const st of document.querySelectorAll('style')) scanCss(st.textContent);
    for (const el of document.querySelectorAll('[style]')) scanCss(el.getAttribute('style'));

    // Media sources.
    for (const el of document.querySelectorAll('img[srcset], source[srcset]')) {
        for (const candidate of (el.getAttribute('srcset') || '').split(',')) {
            push(candidate.trim().split(/\s+/)[0]);
        }
    }
    for (const el of document.querySelectorAll('source[src]')) push(el.getAttribute('src'));
    for (const el of document.querySelectorAll('video[poster]')) push(el.getAttribute('poster'));
    for (const el of document.querySelectorAll('object[data]')) push(el.getAttribute('data'));
    for (const el of document.querySelectorAll('embed[src]')) push(el.getAttribute('src'));

    // Comment nodes.
    const walker = document.createTreeWalker(document.documentElement, NodeFilter.SHOW_COMMENT);
    let comment;
    while ((comment = walker.nextNode()) !== null) {
        let m;
        BARE_RE.lastIndex = 0;
        while ((m = BARE_RE.exec(comment.nodeValue || '')) !== null) push(trimBare(m[0]));
        QUOTED_RE.lastIndex = 0;
        while ((m = QUOTED_RE.exec(comment.nodeValue || '')) !== null) push(m[1]);
    }

    // Meta / link rels.
    for (const meta of document.querySelectorAll('meta[property], meta[name]')) {
        const key = meta.getAttribute('property') || meta.getAttribute('name') || '';
        if (['og:url', 'og:image', 'twitter:url', 'twitter:image'].includes(key)) {
            push(meta.getAttribute('content'));
        }
    }
    for (const link of document.querySelectorAll('link[rel][href]')) {
        const rels = (link.getAttribute('rel') || '').toLowerCase().split(/\s+/);
        const wanted = rels.some((r) =>
            (r === 'canonical' && INCLUDE_CANONICAL) ||
            ['manifest', 'prefetch', 'preload', 'dns-prefetch', 'prerender'].includes(r));
        if (wanted) push(link.getAttribute('href'));
    }
    if (INCLUDE_META_REFRESH) {
        for (const meta of document.querySelectorAll('meta[http-equiv]')) {
            if ((meta.getAttribute('http-equiv') || '').toLowerCase() !== 'refresh') continue;
            const m = REFRESH_RE.exec(meta.getAttribute('content') || '');
            if (m) push(m[1]);
        }
    }

    // Interactive elements.
    if (INCLUDE_INTERACTIVE) {
        for (const btn of document.querySelectorAll('button')) {
            urlBearingData(btn);
            scanScript(btn.getAttribute('onclick'));
        }
        for (const el of document.querySelectorAll('[role="button"], [role="link"]')) {
            urlBearingData(el);
        }
        for (const area of document.querySelectorAll('area[href]')) push(area.getAttribute('href'));
        for (const base of document.querySelectorAll('base[href]')) push(base.getAttribute('href'));
    }

    // Same-origin script src only; iframes are excluded by policy.
    for (const s of document.querySelectorAll('script[src]')) {
        const src = s.getAttribute('src');
        try {
            const resolved = new URL(src, document.baseURI);
            if (resolved.hostname.toLowerCase() === location.hostname.toLowerCase()) push(src);
        } catch (e) { /* unparseable src */ }
    }

    // Visible text.
    const textWalker = document.createTreeWalker(document.body || document.documentElement,
                                                 NodeFilter.SHOW_TEXT);
    let textNode;
    while ((textNode = textWalker.nextNode()) !== null) {
        const parent = textNode.parentElement;
        if (parent && ['SCRIPT', 'STYLE'].includes(parent.tagName)) continue;
        let m;
        BARE_RE.lastIndex = 0;
        while ((m = BARE_RE.exec(textNode.nodeValue || '')) !== null) push(trimBare(m[0]));
    }

    return out;
})()
"#;

/// Expression evaluation that always awaits promises and returns by value.
fn eval_params(script: String) -> Result<EvaluateParams> {
    EvaluateParams::builder()
        .expression(script)
        .await_promise(true)
        .return_by_value(true)
        .build()
        .map_err(|e| anyhow!("bad evaluate params: {e}"))
}

/// Run the reveal pass, then wait `settle_ms` for triggered fetches to land.
pub async fn interactive_reveal(page: &Page, settle_ms: u64) -> Result<()> {
    page.evaluate(eval_params(REVEAL_SCRIPT.to_string())?)
        .await
        .map_err(|e| anyhow!("interactive reveal failed: {}", e))?;
    tokio::time::sleep(Duration::from_millis(settle_ms)).await;
    Ok(())
}

/// Run the live-DOM catalogue and return the raw URL tokens.
pub async fn collect_live_links(page: &Page, opts: &ExtractOptions) -> Result<Vec<String>> {
    let script = COLLECT_SCRIPT
        .replace("__INCLUDE_DATA__", bool_js(opts.data_attributes))
        .replace("__INCLUDE_ONCLICK__", bool_js(opts.onclick))
        .replace("__INCLUDE_FORMS__", bool_js(opts.forms))
        .replace("__INCLUDE_META_REFRESH__", bool_js(opts.meta_refresh))
        .replace("__INCLUDE_CANONICAL__", bool_js(opts.canonical))
        .replace("__INCLUDE_INTERACTIVE__", bool_js(opts.interactive));

    let links: Vec<String> = page
        .evaluate(eval_params(script)?)
        .await
        .map_err(|e| anyhow!("live link collection failed: {}", e))?
        .into_value()
        .map_err(|e| anyhow!("live link collection returned non-array: {}", e))?;

    debug!("live DOM walk found {} candidate URLs", links.len());
    Ok(links)
}

fn bool_js(v: bool) -> &'static str {
    if v {
        "true"
    } else {
        "false"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_substitution_is_complete() {
        let script = COLLECT_SCRIPT
            .replace("__INCLUDE_DATA__", "true")
            .replace("__INCLUDE_ONCLICK__", "false")
            .replace("__INCLUDE_FORMS__", "true")
            .replace("__INCLUDE_META_REFRESH__", "true")
            .replace("__INCLUDE_CANONICAL__", "false")
            .replace("__INCLUDE_INTERACTIVE__", "true");
        assert!(!script.contains("__INCLUDE_"));
    }

    #[test]
    fn reveal_script_covers_the_trigger_families() {
        assert!(REVEAL_SCRIPT.contains("dropdown"));
        assert!(REVEAL_SCRIPT.contains("collapse"));
        assert!(REVEAL_SCRIPT.contains("xem thêm"));
        assert!(REVEAL_SCRIPT.contains("mouseenter"));
    }
}
