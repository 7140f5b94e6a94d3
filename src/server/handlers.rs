//! HTTP route handlers for processes and executions.

use std::str::FromStr;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde::Deserialize;
use tracing::info;

use super::json_error;
use super::state::AppState;
use crate::error::TrackerError;
use crate::model::{ExecutionId, HistoryKind, ProcessDefinition, ProcessId, RevisionId, UserId};

/// Body of `POST /executions/{id}/mark_step`
#[derive(Debug, Deserialize)]
pub struct MarkStepRequest {
    pub step_idx: i64,
    pub mark_as: HistoryKind,
}

/// Malformed ids cannot name an existing row, so they are reported as missing.
fn parse_id<T: FromStr>(entity: &'static str, raw: &str) -> Result<T, TrackerError> {
    raw.parse()
        .map_err(|_| TrackerError::not_found(entity, raw))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, TrackerError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| TrackerError::invalid("body", rejection.body_text()))
}

/// Fallback handler for unmatched routes.
pub async fn handle_not_found() -> impl IntoResponse {
    json_error(StatusCode::NOT_FOUND, "not found")
}

/// GET /health
pub async fn handle_health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// GET /processes
pub async fn handle_list_processes(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, TrackerError> {
    let processes = state.tracker.list_current_all().await?;
    Ok(Json(processes))
}

/// POST /processes
pub async fn handle_create_process(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<UserId>,
    payload: Result<Json<ProcessDefinition>, JsonRejection>,
) -> Result<impl IntoResponse, TrackerError> {
    let definition = body(payload)?;
    let created = state.tracker.create_process(definition, &caller).await?;

    info!(
        process = %created.meta.id,
        revision = %created.revision,
        caller = %caller,
        "Process created"
    );
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /processes/{id}
pub async fn handle_get_process(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, TrackerError> {
    let id: ProcessId = parse_id("process", &id)?;
    Ok(Json(state.tracker.get_current(id).await?))
}

/// PUT /processes/{id}
pub async fn handle_update_process(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<UserId>,
    Path(id): Path<String>,
    payload: Result<Json<ProcessDefinition>, JsonRejection>,
) -> Result<impl IntoResponse, TrackerError> {
    let id: ProcessId = parse_id("process", &id)?;
    let definition = body(payload)?;
    let updated = state.tracker.update_process(id, definition, &caller).await?;

    info!(
        process = %id,
        revision = %updated.revision,
        caller = %caller,
        "Process revised"
    );
    Ok(Json(updated))
}

/// GET /processes/{id}/revisions
pub async fn handle_list_revisions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, TrackerError> {
    let id: ProcessId = parse_id("process", &id)?;
    Ok(Json(state.tracker.list_revisions(id).await?))
}

/// GET /revisions/{revision}
pub async fn handle_get_revision(
    State(state): State<Arc<AppState>>,
    Path(revision): Path<String>,
) -> Result<impl IntoResponse, TrackerError> {
    let revision: RevisionId = parse_id("revision", &revision)?;
    Ok(Json(state.tracker.get_revision(revision).await?))
}

/// POST /processes/{id}/start_execution
pub async fn handle_start_execution(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<UserId>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, TrackerError> {
    let id: ProcessId = parse_id("process", &id)?;
    let execution = state.tracker.start_execution(id, &caller).await?;

    info!(
        process = %id,
        execution = %execution.id,
        caller = %caller,
        "Execution started"
    );
    Ok(Json(execution))
}

/// GET /processes/{id}/executions
pub async fn handle_list_executions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, TrackerError> {
    let id: ProcessId = parse_id("process", &id)?;
    Ok(Json(state.tracker.list_executions(id).await?))
}

/// GET /executions/{id}
pub async fn handle_get_execution(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, TrackerError> {
    let id: ExecutionId = parse_id("execution", &id)?;
    Ok(Json(state.tracker.get_execution(id).await?))
}

/// POST /executions/{id}/mark_step
pub async fn handle_mark_step(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<UserId>,
    Path(id): Path<String>,
    payload: Result<Json<MarkStepRequest>, JsonRejection>,
) -> Result<impl IntoResponse, TrackerError> {
    let id: ExecutionId = parse_id("execution", &id)?;
    let request = body(payload)?;
    let execution = state
        .tracker
        .mark_step(id, request.step_idx, request.mark_as, &caller)
        .await?;

    info!(
        execution = %id,
        step_idx = request.step_idx,
        mark_as = %request.mark_as,
        state = execution.state.as_str(),
        caller = %caller,
        "Step marked"
    );
    Ok(Json(execution))
}
