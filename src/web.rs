//! Axum-based HTTP API
//!
//! Handlers only read the latest published snapshot and send commands over
//! the controller's channel; they never touch controller state directly.

use crate::bms::BmsCommand;
use crate::error::{BmsError, Result};
use crate::status::{StatusSnapshot, dashboard_json};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::WatchStream;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

#[derive(Clone)]
pub struct AppState {
    pub snapshot_rx: watch::Receiver<Arc<StatusSnapshot>>,
    pub commands_tx: mpsc::UnboundedSender<BmsCommand>,
}

#[derive(Deserialize)]
pub struct SocResetBody {
    pub soc: f64,
}

#[derive(Deserialize)]
pub struct CalibrateBody {
    pub capacity_ah: f64,
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "ok": false, "error": message })),
    )
        .into_response()
}

fn dispatch(state: &AppState, cmd: BmsCommand) -> Response {
    match state.commands_tx.send(cmd) {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({ "ok": true }))).into_response(),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "ok": false, "error": "controller not running" })),
        )
            .into_response(),
    }
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.snapshot_rx.borrow().clone();
    Json(snapshot.as_ref().clone())
}

/// Dashboard layout consumed by the bundled HTML page
pub async fn bms_dashboard(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.snapshot_rx.borrow().clone();
    Json(dashboard_json(&snapshot))
}

pub async fn events(State(state): State<AppState>) -> impl IntoResponse {
    let stream = WatchStream::new(state.snapshot_rx.clone()).map(|snapshot| {
        let payload = serde_json::to_string(&*snapshot).unwrap_or_else(|_| "{}".to_string());
        Ok::<Event, std::convert::Infallible>(Event::default().event("status").data(payload))
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

pub async fn reset_soc(State(state): State<AppState>, Json(body): Json<SocResetBody>) -> Response {
    if !body.soc.is_finite() {
        return bad_request("soc must be a finite number");
    }
    dispatch(&state, BmsCommand::ResetSoc(body.soc))
}

pub async fn reset_soh(State(state): State<AppState>) -> Response {
    dispatch(&state, BmsCommand::ResetSoh)
}

pub async fn reset_cycles(State(state): State<AppState>) -> Response {
    dispatch(&state, BmsCommand::ResetCycles)
}

pub async fn calibrate_soh(
    State(state): State<AppState>,
    Json(body): Json<CalibrateBody>,
) -> Response {
    if !(body.capacity_ah.is_finite() && body.capacity_ah > 0.0) {
        return bad_request("capacity_ah must be positive");
    }
    dispatch(&state, BmsCommand::CalibrateCapacity(body.capacity_ah))
}

pub async fn clear_protection(State(state): State<AppState>) -> Response {
    dispatch(&state, BmsCommand::ClearProtection)
}

pub async fn stop_balancing(State(state): State<AppState>) -> Response {
    dispatch(&state, BmsCommand::StopBalancing)
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/status", get(status))
        .route("/bms", get(bms_dashboard))
        .route("/api/events", get(events))
        .route("/api/soc/reset", post(reset_soc))
        .route("/api/soh/reset", post(reset_soh))
        .route("/api/soh/cycles/reset", post(reset_cycles))
        .route("/api/soh/calibrate", post(calibrate_soh))
        .route("/api/protection/clear", post(clear_protection))
        .route("/api/balancing/stop", post(stop_balancing))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Bind and serve until `shutdown` turns true
pub async fn serve(
    state: AppState,
    host: &str,
    port: u16,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let router = build_router(state);
    let logger = crate::logging::get_logger("web");

    let addr = match host.parse::<IpAddr>() {
        Ok(ip) => SocketAddr::new(ip, port),
        Err(_) => {
            logger.warn(&format!("Invalid host '{}'; falling back to 127.0.0.1", host));
            ([127, 0, 0, 1], port).into()
        }
    };

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| BmsError::web(format!("Failed to bind {}: {}", addr, e)))?;
    let local_addr = listener.local_addr()?;
    logger.info(&format!(
        "Web server listening at http://{} (dashboard JSON /bms, API /api)",
        local_addr
    ));

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            while shutdown.changed().await.is_ok() {
                if *shutdown.borrow() {
                    break;
                }
            }
        })
        .await
        .map_err(|e| BmsError::web(e.to_string()))?;
    Ok(())
}
