//! Chat relay to the RAG backend

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::post,
};

use super::{ApiError, ApiState};

const RELAY_FAILED: &str = "Failed to get response from RAG backend";

/// Build chat router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .with_state(state)
}

/// Forward an OpenAI-style chat-completion body and pass the reply through
async fn chat(
    State(state): State<Arc<ApiState>>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(body) = payload.map_err(|e| {
        tracing::warn!(error = %e, "rejected chat request body");
        ApiError::bad_request(format!("Invalid JSON body: {}", e.body_text()))
    })?;

    let message_count = body
        .get("messages")
        .and_then(serde_json::Value::as_array)
        .map_or(0, Vec::len);
    tracing::info!(
        messages = message_count,
        backend = %state.rag.base_url(),
        "relaying chat completion"
    );

    let reply = state.rag.relay(&body).await.map_err(|e| {
        if e.is_unreachable() {
            tracing::error!(error = %e, kind = "unreachable", "RAG backend unreachable");
        } else {
            tracing::error!(error = %e, status = ?e.upstream_status(), "RAG backend error");
        }
        ApiError::from_error(RELAY_FAILED, &e).with_backend_url(state.rag.completions_url())
    })?;

    tracing::debug!("RAG backend replied");
    Ok(Json(reply))
}
