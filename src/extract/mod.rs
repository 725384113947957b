//! Link extraction: one catalogue, two backends.
//!
//! The static backend walks HTML parsed with `scraper`; the dynamic backend
//! walks the live DOM of a headless page after an interactive reveal pass.
//! Both emit the same thing: a deduplicated list of raw URL strings in
//! first-encountered order, not yet normalized or filtered.

pub mod dynamic_dom;
pub mod patterns;
pub mod static_dom;

pub use dynamic_dom::{collect_live_links, interactive_reveal};
pub use static_dom::StaticExtractor;

use crate::core::types::ScanConfig;

/// Which catalogue rules are active; derived from the scan config toggles.
#[derive(Debug, Clone, Copy)]
pub struct ExtractOptions {
    pub data_attributes: bool,
    pub onclick: bool,
    pub forms: bool,
    pub meta_refresh: bool,
    pub canonical: bool,
    pub interactive: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            data_attributes: true,
            onclick: true,
            forms: true,
            meta_refresh: true,
            canonical: true,
            interactive: true,
        }
    }
}

impl From<&ScanConfig> for ExtractOptions {
    fn from(cfg: &ScanConfig) -> Self {
        Self {
            data_attributes: cfg.include_data_attributes,
            onclick: cfg.include_onclick,
            forms: cfg.include_forms,
            meta_refresh: cfg.include_meta_refresh,
            canonical: cfg.include_canonical,
            interactive: cfg.include_interactive_elements,
        }
    }
}
