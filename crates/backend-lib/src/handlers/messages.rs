// ============================
// crates/backend-lib/src/handlers/messages.rs
// ============================
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use meetwire_common::ChatDraft;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{JsonBody, QueryParams};
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::storage::Storage;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

/// `GET /messages/room/{room}?limit=`
///
/// The limit is capped at `chat.history_limit`.
pub async fn room_history<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _user: AuthUser,
    Path(room): Path<String>,
    QueryParams(query): QueryParams<HistoryQuery>,
) -> Result<Json<Value>, AppError> {
    let max = state.settings.chat.history_limit;
    let limit = query.limit.unwrap_or(max).clamp(1, max);

    let messages = state.presence.get_room_history(&room, limit).await?;
    Ok(Json(json!({ "success": true, "messages": messages })))
}

/// `POST /messages`
///
/// Stores a room message without pushing it to connected clients.
pub async fn create<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _user: AuthUser,
    JsonBody(draft): JsonBody<ChatDraft>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let message = state.presence.record_message(draft).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "message": message })),
    ))
}
