//! HTTP JSON API over the tracker, served with `axum` + `tokio`.
//!
//! Endpoints:
//! - GET  /health                              - Server status (exempt from auth)
//! - GET  /processes                           - Current revision of every process
//! - POST /processes                           - Create a process
//! - GET  /processes/{id}                      - Current revision of one process
//! - PUT  /processes/{id}                      - Record a new revision
//! - GET  /processes/{id}/revisions            - Revision history, newest first
//! - POST /processes/{id}/start_execution      - Start an execution
//! - GET  /processes/{id}/executions           - Executions, newest first
//! - GET  /revisions/{revision}                - One revision by token
//! - GET  /executions/{id}                     - Full execution view
//! - POST /executions/{id}/mark_step           - Mark a step started or done
//!
//! Every endpoint except /health requires `Authorization: Bearer <token>`.

mod handlers;
mod middleware;
mod state;

use std::sync::Arc;

use axum::body::Body;
use axum::extract::DefaultBodyLimit;
use axum::http::{Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{middleware as axum_middleware, Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use self::handlers::{
    handle_create_process, handle_get_execution, handle_get_process, handle_get_revision,
    handle_health, handle_list_executions, handle_list_processes, handle_list_revisions,
    handle_mark_step, handle_not_found, handle_start_execution, handle_update_process,
};
use self::middleware::auth_middleware;
pub use self::handlers::MarkStepRequest;
pub use self::state::AppState;
use crate::config::ServerConfig;
use crate::error::TrackerError;
use crate::telemetry::{create_request_span, generate_correlation_id};

/// Maximum request body size: 1 MB.
const MAX_BODY_SIZE: usize = 1024 * 1024;

/// Construct a JSON error response with the given status code and message.
fn json_error(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

impl IntoResponse for TrackerError {
    fn into_response(self) -> Response {
        match &self {
            TrackerError::NotFound { .. } => json_error(StatusCode::NOT_FOUND, &self.to_string()),
            TrackerError::InvalidArgument { field, message } => {
                let mut errors = serde_json::Map::new();
                errors.insert(field.clone(), serde_json::json!([message]));
                (StatusCode::BAD_REQUEST, Json(serde_json::Value::Object(errors))).into_response()
            }
            TrackerError::Unauthorized => {
                json_error(StatusCode::UNAUTHORIZED, "authentication required")
            }
            TrackerError::Storage(err) => {
                error!(error = %err, "Storage failure while handling request");
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal storage error")
            }
        }
    }
}

/// Build the API router.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers(Any);

    let trace = TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
        create_request_span(
            request.method().as_str(),
            request.uri().path(),
            &generate_correlation_id(),
        )
    });

    Router::new()
        .route("/health", get(handle_health))
        .route(
            "/processes",
            get(handle_list_processes).post(handle_create_process),
        )
        .route(
            "/processes/{id}",
            get(handle_get_process).put(handle_update_process),
        )
        .route("/processes/{id}/revisions", get(handle_list_revisions))
        .route("/processes/{id}/start_execution", post(handle_start_execution))
        .route("/processes/{id}/executions", get(handle_list_executions))
        .route("/revisions/{revision}", get(handle_get_revision))
        .route("/executions/{id}", get(handle_get_execution))
        .route("/executions/{id}/mark_step", post(handle_mark_step))
        .fallback(handle_not_found)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(trace)
        .layer(cors)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .with_state(state)
}

/// Serve the API until Ctrl-C.
pub async fn start_server(config: &ServerConfig, state: Arc<AppState>) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    if state.auth.tokens.is_empty() {
        tracing::warn!("No API tokens configured; every request will be rejected");
    }
    info!("runbook API listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.tracker.store().close().await;
    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
