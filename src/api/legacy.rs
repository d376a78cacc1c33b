//! Legacy conversational-agent endpoints
//!
//! Kept for older frontends that connect to a hosted agent directly; the
//! current pipeline goes through `/api/speech-to-text`, `/api/chat` and
//! `/api/text-to-speech` instead.

use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use super::{ApiError, ApiState};
use crate::Error;

const SIGNED_URL_FAILED: &str = "Failed to get signed URL";

/// Build legacy router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/signed-url", get(signed_url))
        .route("/getAgentId", get(agent_id))
        .with_state(state)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedUrlResponse {
    pub signed_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentIdResponse {
    pub agent_id: String,
}

async fn signed_url(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<SignedUrlResponse>, ApiError> {
    let agent = state.agent.as_ref().ok_or_else(|| {
        ApiError::from_error(
            SIGNED_URL_FAILED,
            &Error::Config(
                "agent not configured (ELEVENLABS_API_KEY or ELEVENLABS_AGENT_ID missing)"
                    .to_string(),
            ),
        )
    })?;

    let signed_url = agent.signed_url().await.map_err(|e| {
        tracing::error!(error = %e, "failed to get signed URL");
        ApiError::from_error(SIGNED_URL_FAILED, &e)
    })?;

    Ok(Json(SignedUrlResponse { signed_url }))
}

async fn agent_id(State(state): State<Arc<ApiState>>) -> Json<AgentIdResponse> {
    let agent_id = state.agent_id.clone().unwrap_or_default();
    tracing::debug!(%agent_id, "returning agent id");
    Json(AgentIdResponse { agent_id })
}
