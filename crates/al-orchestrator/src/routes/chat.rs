//! Chat endpoints: one message per request.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;

use crate::dialogue::Session;
use crate::error::{ApiError, ApiResult};
use crate::service::ChatReply;
use crate::state::AppState;

/// Request body for one user message.
#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub text: String,
}

/// POST /api/v1/chat/{user_id}/messages — run one dialogue turn.
pub async fn post_message(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(req): Json<MessageRequest>,
) -> ApiResult<Json<ChatReply>> {
    if user_id.trim().is_empty() {
        return Err(ApiError::BadRequest("empty user id".into()));
    }
    let reply = state.chat.handle_message(&user_id, &req.text).await?;
    Ok(Json(reply))
}

/// GET /api/v1/chat/{user_id} — current session snapshot.
pub async fn get_session(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Session>> {
    state
        .chat
        .snapshot(&user_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("session '{user_id}' not found")))
}

/// DELETE /api/v1/chat/{user_id} — forget the conversation.
pub async fn clear_session(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<StatusCode> {
    if state.chat.clear(&user_id).await? {
        tracing::info!(user_id = %user_id, "session cleared via API");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("session '{user_id}' not found")))
    }
}
