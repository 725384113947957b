pub mod auth;
pub mod core;
pub mod errors;
pub mod extract;
pub mod fetch;
pub mod scan;
pub mod session;
pub mod urlkit;

// --- Primary core exports ---
pub use crate::core::types;
pub use crate::core::types::*;
pub use crate::core::AppState;

// --- Frequently-used entry points ---
pub use errors::ScanError;
pub use scan::scan_website;
pub use session::{get_scan_logs, get_scan_results, pause_scan, resume_scan, stop_scan};
