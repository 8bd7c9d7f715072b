//! HTTP handlers for orchestration endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::application::orchestration::Orchestrator;

use super::dto::{
    CapabilitiesResponse, ClearSessionResponse, ErrorResponse, HealthResponse, HistoryQuery,
    MessageResponse, PauseResponse, ProcessMessageRequest, SessionHistoryResponse,
    WorkflowRequest,
};

/// Application state for orchestration endpoints.
#[derive(Clone)]
pub struct OrchestrationAppState {
    pub orchestrator: Arc<Orchestrator>,
}

impl OrchestrationAppState {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }
}

fn missing_user_id() -> axum::response::Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::bad_request("user_id is required")),
    )
        .into_response()
}

/// Process a user message.
///
/// POST /api/messages
pub async fn process_message(
    State(state): State<OrchestrationAppState>,
    Json(request): Json<ProcessMessageRequest>,
) -> impl IntoResponse {
    if request.user_id.trim().is_empty() {
        return missing_user_id();
    }
    if request.text.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::bad_request("text cannot be empty")),
        )
            .into_response();
    }

    let processed = state
        .orchestrator
        .process_message(&request.user_id, &request.text, request.metadata)
        .await;
    (StatusCode::OK, Json(MessageResponse::from(processed))).into_response()
}

/// List public capabilities grouped by agent.
///
/// GET /api/capabilities
pub async fn list_capabilities(State(state): State<OrchestrationAppState>) -> impl IntoResponse {
    Json(CapabilitiesResponse::from(
        state.orchestrator.list_capabilities(),
    ))
}

/// Service health.
///
/// GET /api/health
pub async fn health(State(state): State<OrchestrationAppState>) -> impl IntoResponse {
    Json(HealthResponse::from(state.orchestrator.health().await))
}

/// Resume the user's paused workflow.
///
/// POST /api/workflows/resume
pub async fn resume_workflow(
    State(state): State<OrchestrationAppState>,
    Json(request): Json<WorkflowRequest>,
) -> impl IntoResponse {
    if request.user_id.trim().is_empty() {
        return missing_user_id();
    }
    let processed = state.orchestrator.resume_workflow(&request.user_id).await;
    (StatusCode::OK, Json(MessageResponse::from(processed))).into_response()
}

/// Ask the user's running workflow to pause before its next step.
///
/// POST /api/workflows/pause
pub async fn pause_workflow(
    State(state): State<OrchestrationAppState>,
    Json(request): Json<WorkflowRequest>,
) -> impl IntoResponse {
    if request.user_id.trim().is_empty() {
        return missing_user_id();
    }
    let paused = state.orchestrator.pause_workflow(&request.user_id);
    (StatusCode::OK, Json(PauseResponse { paused })).into_response()
}

/// Recent conversation history for a user.
///
/// GET /api/sessions/:user_id/history?limit=N
pub async fn session_history(
    State(state): State<OrchestrationAppState>,
    Path(user_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> impl IntoResponse {
    if user_id.trim().is_empty() {
        return missing_user_id();
    }
    match state
        .orchestrator
        .session_history(&user_id, query.limit())
        .await
    {
        Some(history) => (
            StatusCode::OK,
            Json(SessionHistoryResponse::from(history)),
        )
            .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::not_found("Session", &user_id)),
        )
            .into_response(),
    }
}

/// Forget a user's session.
///
/// DELETE /api/sessions/:user_id
pub async fn clear_session(
    State(state): State<OrchestrationAppState>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    if user_id.trim().is_empty() {
        return missing_user_id();
    }
    let cleared = state.orchestrator.clear_session(&user_id).await;
    (StatusCode::OK, Json(ClearSessionResponse { cleared })).into_response()
}
