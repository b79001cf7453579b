//! Status and admin HTTP API.
//!
//! Handlers talk to the running daemon and its local coordinator directly
//! and return JSON wrapped in [`ApiResponse`].

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use ringkeep_coord::{CoordError, Coordinator, LocalCoordinator};
use ringkeep_core::DaemonState;
use ringkeep_update::{DaemonStatus, UpdateDaemon};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub daemon: Arc<UpdateDaemon<LocalCoordinator>>,
}

/// Response wrapper for consistent API format.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

/// Body of `GET /api/v1/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusView {
    #[serde(flatten)]
    pub daemon: DaemonStatus,
    /// State currently stored in the coordinator, which may be ahead of
    /// what the daemon has processed.
    pub persisted_state: Option<DaemonState>,
}

/// Body of an accepted `POST /api/v1/trigger`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerAccepted {
    pub revision: u64,
}

/// Build the API router.
pub fn build_router(daemon: Arc<UpdateDaemon<LocalCoordinator>>) -> Router {
    let api_routes = Router::new()
        .route("/status", get(status))
        .route("/trigger", post(trigger))
        .with_state(ApiState { daemon });

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/api/v1", api_routes)
}

/// GET /healthz
async fn healthz() -> impl IntoResponse {
    ApiResponse::ok("ok")
}

/// GET /api/v1/status
async fn status(State(state): State<ApiState>) -> impl IntoResponse {
    let daemon = &state.daemon;
    match daemon.coordinator().get_daemon_state(daemon.key()) {
        Ok(persisted_state) => ApiResponse::ok(StatusView {
            daemon: daemon.status_snapshot(),
            persisted_state,
        })
        .into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

/// POST /api/v1/trigger
async fn trigger(State(state): State<ApiState>) -> impl IntoResponse {
    let daemon = &state.daemon;
    match daemon.coordinator().mark_updateable(daemon.key()) {
        Ok(revision) => {
            info!(key = %daemon.key(), revision, "update requested over api");
            (StatusCode::ACCEPTED, ApiResponse::ok(TriggerAccepted { revision })).into_response()
        }
        Err(CoordError::InvalidTransition { from, .. }) => {
            let current = from.map_or("unset", DaemonState::as_str);
            warn!(key = %daemon.key(), current, "update request refused");
            error_response(
                &format!("host is {current}, only an idle host can be marked updateable"),
                StatusCode::CONFLICT,
            )
            .into_response()
        }
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}
