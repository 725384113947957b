//! Per-scan session state: streaming sink, control plane, and the poll-style
//! RPC operations observers use while a crawl is still running.

pub mod control;
pub mod registry;

pub use control::{wait_if_paused, ControlFlags};
pub use registry::{LogContext, SessionRegistry, SessionStore};

use crate::core::types::{ControlAck, ScanLog, ScanResult};
use crate::core::AppState;
use crate::errors::ScanError;

/// Current log buffer contents; empty after the session store is evicted.
pub fn get_scan_logs(state: &AppState, scan_id: &str) -> Vec<ScanLog> {
    state
        .sessions
        .get(scan_id)
        .map(|store| store.snapshot_logs())
        .unwrap_or_default()
}

/// Current results snapshot; empty after the session store is evicted.
pub fn get_scan_results(state: &AppState, scan_id: &str) -> Vec<ScanResult> {
    state
        .sessions
        .get(scan_id)
        .map(|store| store.snapshot_results())
        .unwrap_or_default()
}

pub fn pause_scan(state: &AppState, scan_id: &str) -> Result<ControlAck, ScanError> {
    let store = state
        .sessions
        .get(scan_id)
        .ok_or_else(|| ScanError::UnknownScan(scan_id.to_string()))?;
    store.control.pause();
    Ok(ControlAck {
        success: true,
        message: format!("Scan {scan_id} paused"),
    })
}

pub fn resume_scan(state: &AppState, scan_id: &str) -> Result<ControlAck, ScanError> {
    let store = state
        .sessions
        .get(scan_id)
        .ok_or_else(|| ScanError::UnknownScan(scan_id.to_string()))?;
    store.control.resume();
    Ok(ControlAck {
        success: true,
        message: format!("Scan {scan_id} resumed"),
    })
}

pub fn stop_scan(state: &AppState, scan_id: &str) -> Result<ControlAck, ScanError> {
    let store = state
        .sessions
        .get(scan_id)
        .ok_or_else(|| ScanError::UnknownScan(scan_id.to_string()))?;
    store.control.stop();
    Ok(ControlAck {
        success: true,
        message: format!("Scan {scan_id} stopping"),
    })
}
