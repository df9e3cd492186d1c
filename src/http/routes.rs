//! HTTP route definitions

use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use tracing::info;
use uuid::Uuid;

use crate::app::AppState;
use crate::scheduler::SchedulerError;
use crate::store::directory::{DirectoryError, MatchStatus};
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;
use crate::ws::protocol::Side;

/// Upper bound for plain HTTP requests
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // CORS configuration - support multiple origins (comma-separated in CLIENT_ORIGIN)
    let allowed_origins: Vec<header::HeaderValue> = state
        .config
        .client_origin
        .split(',')
        .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true);

    Router::new()
        .route("/health", get(health_handler))
        .route("/ws/pong/:match_id", get(ws_handler))
        .route("/matches/:match_id/start", post(start_handler))
        .route("/matches/:match_id/stop", post(stop_handler))
        .route("/matches/:match_id/ready", post(ready_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
                .layer(cors),
        )
        .with_state(state)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    active_matches: usize,
    connections: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        active_matches: state.registry.active_matches(),
        connections: state.registry.total_connections(),
    })
}

// ============================================================================
// Match control endpoints
// ============================================================================

#[derive(Serialize)]
struct MatchControlResponse {
    match_id: Uuid,
    status: &'static str,
}

async fn start_handler(
    State(state): State<AppState>,
    Path(match_id): Path<Uuid>,
) -> Result<(StatusCode, Json<MatchControlResponse>), AppError> {
    let session = state.directory.get_match_session(match_id).await?;
    if matches!(
        session.status,
        MatchStatus::Finished | MatchStatus::Cancelled
    ) {
        return Err(AppError::Conflict(format!(
            "Match {} has already ended",
            match_id
        )));
    }

    state
        .directory
        .set_match_status(match_id, MatchStatus::Running)
        .await?;
    state.scheduler.enqueue(match_id).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(MatchControlResponse {
            match_id,
            status: "queued",
        }),
    ))
}

async fn stop_handler(
    State(state): State<AppState>,
    Path(match_id): Path<Uuid>,
) -> Result<Json<MatchControlResponse>, AppError> {
    if !state.registry.stop(&match_id) {
        return Err(AppError::NotFound(format!("No live match {}", match_id)));
    }
    info!(match_id = %match_id, "Match stop requested");

    Ok(Json(MatchControlResponse {
        match_id,
        status: "stopping",
    }))
}

#[derive(Deserialize)]
struct ReadyRequest {
    side: Side,
}

async fn ready_handler(
    State(state): State<AppState>,
    Path(match_id): Path<Uuid>,
    Json(req): Json<ReadyRequest>,
) -> Result<Json<MatchControlResponse>, AppError> {
    state.directory.mark_ready(match_id, req.side).await?;
    info!(match_id = %match_id, side = %req.side, "Player ready");

    Ok(Json(MatchControlResponse {
        match_id,
        status: "ready",
    }))
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DirectoryError> for AppError {
    fn from(e: DirectoryError) -> Self {
        match e {
            DirectoryError::SessionNotFound(_) | DirectoryError::ParametersNotFound(_) => {
                AppError::NotFound(e.to_string())
            }
            DirectoryError::Backend(_) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<SchedulerError> for AppError {
    fn from(e: SchedulerError) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, MatchConfig};
    use crate::store::directory::{InMemoryDirectory, MatchDirectory, MatchSession};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_config() -> Config {
        Config {
            server_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "debug".into(),
            client_origin: "http://localhost:8000".into(),
            supabase: None,
            game: MatchConfig::default(),
        }
    }

    fn app() -> (Router, Arc<InMemoryDirectory>) {
        let directory = Arc::new(InMemoryDirectory::new());
        let state = AppState::with_directory(test_config(), directory.clone());
        (build_router(state), directory)
    }

    fn post(uri: String, body: &'static str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn health_reports_counters() {
        let (router, _) = app();
        let response = router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["active_matches"], 0);
    }

    #[tokio::test]
    async fn ready_marks_one_side() {
        let (router, directory) = app();
        let id = Uuid::new_v4();
        directory.insert_session(MatchSession::local(id, "alice", "bob"), None);

        let response = router
            .oneshot(post(format!("/matches/{}/ready", id), r#"{"side":"right"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let session = directory.get_match_session(id).await.unwrap();
        assert!(session.ready_right);
        assert!(!session.ready_left);
    }

    #[tokio::test]
    async fn start_marks_running_and_queues() {
        let (router, directory) = app();
        let id = Uuid::new_v4();
        directory.insert_session(MatchSession::local(id, "alice", "bob"), None);

        let response = router
            .oneshot(post(format!("/matches/{}/start", id), ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(
            directory.get_match_session(id).await.unwrap().status,
            MatchStatus::Running
        );
    }

    #[tokio::test]
    async fn ended_match_cannot_restart() {
        let (router, directory) = app();
        let id = Uuid::new_v4();
        directory.insert_session(MatchSession::local(id, "alice", "bob"), None);
        tokio_test::assert_ok!(
            directory
                .set_match_status(id, MatchStatus::Finished)
                .await
        );

        let response = router
            .oneshot(post(format!("/matches/{}/start", id), ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn unknown_matches_are_not_found() {
        let (router, _) = app();
        let id = Uuid::new_v4();

        let response = router
            .clone()
            .oneshot(post(format!("/matches/{}/start", id), ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = router
            .oneshot(post(format!("/matches/{}/stop", id), ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
