use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use sitescan::core::config;
use sitescan::{
    scan_website, session, AppState, ControlAck, ScanConfig, ScanError, ScanLog, ScanResponse,
    ScanResult,
};

#[derive(serde::Serialize)]
struct ErrorResponse {
    error: String,
}

fn parse_port_from_args() -> Option<u16> {
    let mut args = std::env::args().peekable();
    while let Some(a) = args.next() {
        if a == "--port" {
            if let Some(v) = args.next() {
                if let Ok(p) = v.parse::<u16>() {
                    return Some(p);
                }
            }
        } else if let Some(rest) = a.strip_prefix("--port=") {
            if let Ok(p) = rest.parse::<u16>() {
                return Some(p);
            }
        }
    }
    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=warn"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    info!("Starting sitescan engine");

    let state = Arc::new(AppState::default());

    let app = Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .route("/scan", post(scan_handler))
        .route("/scan/{scan_id}/logs", get(logs_handler))
        .route("/scan/{scan_id}/results", get(results_handler))
        .route("/scan/{scan_id}/pause", post(pause_handler))
        .route("/scan/{scan_id}/resume", post(resume_handler))
        .route("/scan/{scan_id}/stop", post(stop_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let port: u16 = parse_port_from_args()
        .or_else(config::port_from_env)
        .unwrap_or(5080);
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(l) => l,
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
            anyhow::bail!(
                "Address already in use: {}. Stop the existing process or run with --port {} (or set PORT/SITESCAN_PORT).",
                bind_addr,
                port.saturating_add(1)
            )
        }
        Err(e) => return Err(e.into()),
    };
    info!("sitescan listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state.clone()))
        .await?;

    Ok(())
}

async fn shutdown_signal(state: Arc<AppState>) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).ok();

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = async {
                if let Some(ref mut s) = sigterm {
                    s.recv().await;
                } else {
                    futures::future::pending::<()>().await;
                }
            } => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("shutdown signal received, stopping live scans");
    state.sessions.stop_all();
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "sitescan",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Long-running: returns when the crawl completes. Observers poll the logs
/// and results routes while this is in flight.
async fn scan_handler(
    State(state): State<Arc<AppState>>,
    Json(cfg): Json<ScanConfig>,
) -> Result<Json<ScanResponse>, (StatusCode, Json<ErrorResponse>)> {
    match scan_website(&state, cfg).await {
        Ok(response) => Ok(Json(response)),
        Err(e @ ScanError::InvalidSeedUrl { .. }) => Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )),
        Err(e) => {
            error!("scan failed: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            ))
        }
    }
}

async fn logs_handler(
    State(state): State<Arc<AppState>>,
    Path(scan_id): Path<String>,
) -> Json<Vec<ScanLog>> {
    Json(session::get_scan_logs(&state, &scan_id))
}

async fn results_handler(
    State(state): State<Arc<AppState>>,
    Path(scan_id): Path<String>,
) -> Json<Vec<ScanResult>> {
    Json(session::get_scan_results(&state, &scan_id))
}

fn control_response(
    result: Result<ControlAck, ScanError>,
) -> Result<Json<ControlAck>, (StatusCode, Json<ErrorResponse>)> {
    match result {
        Ok(ack) => Ok(Json(ack)),
        Err(e) => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )),
    }
}

async fn pause_handler(
    State(state): State<Arc<AppState>>,
    Path(scan_id): Path<String>,
) -> Result<Json<ControlAck>, (StatusCode, Json<ErrorResponse>)> {
    control_response(session::pause_scan(&state, &scan_id))
}

async fn resume_handler(
    State(state): State<Arc<AppState>>,
    Path(scan_id): Path<String>,
) -> Result<Json<ControlAck>, (StatusCode, Json<ErrorResponse>)> {
    control_response(session::resume_scan(&state, &scan_id))
}

async fn stop_handler(
    State(state): State<Arc<AppState>>,
    Path(scan_id): Path<String>,
) -> Result<Json<ControlAck>, (StatusCode, Json<ErrorResponse>)> {
    control_response(session::stop_scan(&state, &scan_id))
}
