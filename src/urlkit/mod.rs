//! URL normalization and classification.
//!
//! Crawl identity is path-only: the normalizer strips both fragment and query,
//! so `/page?a=1#top` and `/page` are the same frontier entry. Origin checks
//! compare hostnames only (case-insensitive), matching the engine's historical
//! behavior; scheme and port are deliberately ignored.

mod classify;
mod normalize;

pub use classify::{is_static_asset, PathFilter};
pub use normalize::{normalize, same_origin};
