//! REST endpoints for assistant management, plus the debug listing.

use std::fmt::Write as _;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};

use super::manager::AssistantManager;
use super::model::CreateAssistantFields;
use crate::error::AssistantError;

/// Shared state for assistant routes.
#[derive(Clone)]
pub struct AssistantRouteState {
    pub manager: Arc<AssistantManager>,
}

/// Map a manager error to a JSON error response.
fn error_response(error: AssistantError) -> Response {
    let status = match &error {
        AssistantError::InvalidFields(_) => StatusCode::BAD_REQUEST,
        AssistantError::NotFound { .. } => StatusCode::NOT_FOUND,
        AssistantError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(serde_json::json!({"error": error.to_string()}))).into_response()
}

/// GET /api/assistants
async fn get_snapshot(State(state): State<AssistantRouteState>) -> impl IntoResponse {
    Json(state.manager.snapshot().await)
}

/// POST /api/assistants/bootstrap
async fn bootstrap(State(state): State<AssistantRouteState>) -> Response {
    match state.manager.get_or_create_assistant().await {
        Ok(assistant) => Json(assistant).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /api/assistants
async fn create_assistant(
    State(state): State<AssistantRouteState>,
    Json(fields): Json<CreateAssistantFields>,
) -> Response {
    match state.manager.create_custom_assistant(fields).await {
        Ok(assistant) => (StatusCode::CREATED, Json(assistant)).into_response(),
        Err(e) => error_response(e),
    }
}

/// PUT /api/assistants/{id}
async fn edit_assistant(
    State(state): State<AssistantRouteState>,
    Path(id): Path<String>,
    Json(fields): Json<CreateAssistantFields>,
) -> Response {
    match state.manager.edit_custom_assistant(fields, &id).await {
        Ok(assistant) => Json(assistant).into_response(),
        Err(e) => error_response(e),
    }
}

/// DELETE /api/assistants/{id}
async fn delete_assistant(
    State(state): State<AssistantRouteState>,
    Path(id): Path<String>,
) -> Response {
    match state.manager.delete_assistant(&id).await {
        Ok(removed) => Json(serde_json::json!({"success": true, "removed": removed})).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /api/assistants/{id}/select
async fn select_assistant(
    State(state): State<AssistantRouteState>,
    Path(id): Path<String>,
) -> Response {
    match state.manager.select_assistant(&id).await {
        Ok(assistant) => Json(assistant).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /debug
///
/// Plain-text view of the assistant list for environments without a UI.
/// Bootstraps the manager first, the way the debug page always did.
async fn debug_page(State(state): State<AssistantRouteState>) -> Response {
    if let Err(e) = state.manager.get_or_create_assistant().await {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to load assistants: {e}\n"),
        )
            .into_response();
    }

    let snapshot = state.manager.snapshot().await;
    let selected_id = snapshot
        .selected_assistant
        .as_ref()
        .map(|a| a.assistant_id.as_str());

    let mut body = String::from("Debug Page\n\nAssistants\n");
    if snapshot.is_loading_all_assistants {
        body.push_str("Loading assistants...\n");
    } else {
        for assistant in &snapshot.assistants {
            let marker = if Some(assistant.assistant_id.as_str()) == selected_id {
                " (selected)"
            } else {
                ""
            };
            let _ = writeln!(body, "- {}{}", assistant.name, marker);
        }
    }
    body.into_response()
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "canvas-assist"
    }))
}

/// Build the assistant REST routes.
pub fn assistant_routes(state: AssistantRouteState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/debug", get(debug_page))
        .route("/api/assistants", get(get_snapshot).post(create_assistant))
        .route("/api/assistants/bootstrap", post(bootstrap))
        .route(
            "/api/assistants/{id}",
            put(edit_assistant).delete(delete_assistant),
        )
        .route("/api/assistants/{id}/select", post(select_assistant))
        .with_state(state)
}
