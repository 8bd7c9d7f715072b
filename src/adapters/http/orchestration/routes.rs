//! Axum router configuration for orchestration endpoints.

use axum::{
    routing::{delete, get, post},
    Router,
};

use super::handlers::{
    clear_session, health, list_capabilities, pause_workflow, process_message, resume_workflow,
    session_history, OrchestrationAppState,
};

/// Create the orchestration API router.
///
/// # Routes
///
/// - `POST /messages` - Process a user message
/// - `GET /capabilities` - Discovery listing of public capabilities
/// - `GET /health` - Service health
/// - `POST /workflows/resume` - Resume a paused workflow
/// - `POST /workflows/pause` - Pause a running workflow
/// - `GET /sessions/:user_id/history` - Recent session history
/// - `DELETE /sessions/:user_id` - Clear a session
pub fn orchestration_routes() -> Router<OrchestrationAppState> {
    Router::new()
        .route("/messages", post(process_message))
        .route("/capabilities", get(list_capabilities))
        .route("/health", get(health))
        .route("/workflows/resume", post(resume_workflow))
        .route("/workflows/pause", post(pause_workflow))
        .route("/sessions/:user_id/history", get(session_history))
        .route("/sessions/:user_id", delete(clear_session))
}

/// Create the complete orchestration router with state applied.
///
/// Suitable for mounting at `/api`.
pub fn orchestration_router(state: OrchestrationAppState) -> Router {
    orchestration_routes().with_state(state)
}
