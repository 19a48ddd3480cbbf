// ============================
// crates/backend-lib/src/handlers/meetings.rs
// ============================
//! Meeting lifecycle over REST.
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::JsonBody;
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::meeting::{MeetingUpdate, NewMeeting};
use crate::storage::Storage;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinByCode {
    #[serde(default)]
    pub meeting_code: String,
}

/// `POST /meetings`
pub async fn create<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
    JsonBody(body): JsonBody<NewMeeting>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let meeting = state.meetings.schedule(&user.user_id, body).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "meeting": meeting })),
    ))
}

/// `GET /meetings`
pub async fn list_all<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _user: AuthUser,
) -> Result<Json<Value>, AppError> {
    let meetings = state.meetings.list().await?;
    Ok(Json(json!({ "success": true, "meetings": meetings })))
}

/// `GET /meetings/active`
pub async fn list_active<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _user: AuthUser,
) -> Result<Json<Value>, AppError> {
    let meetings = state.meetings.list_active().await?;
    Ok(Json(json!({ "success": true, "meetings": meetings })))
}

/// `GET /meetings/{id}`
pub async fn get<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let meeting = state.meetings.get(&id).await?;
    Ok(Json(json!({ "success": true, "meeting": meeting })))
}

/// `PUT /meetings/{id}`
pub async fn update<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
    Path(id): Path<String>,
    JsonBody(changes): JsonBody<MeetingUpdate>,
) -> Result<Json<Value>, AppError> {
    let meeting = state.meetings.update(&id, &user.user_id, changes).await?;
    Ok(Json(json!({ "success": true, "meeting": meeting })))
}

/// `DELETE /meetings/{id}`
pub async fn cancel<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    state.meetings.get_as_organizer(&id, &user.user_id).await?;
    let meeting = state.meetings.cancel(&id).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Meeting cancelled successfully",
        "meeting": meeting,
    })))
}

/// `POST /meetings/{id}/start`
pub async fn start<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    state.meetings.get_as_organizer(&id, &user.user_id).await?;
    let activated = state.meetings.activate(&id).await?;
    Ok(Json(json!({ "success": true, "meeting": activated })))
}

/// `POST /meetings/{id}/end`
pub async fn end<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    state.meetings.get_as_organizer(&id, &user.user_id).await?;
    let meeting = state.meetings.deactivate(&id).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Meeting ended successfully",
        "meeting": meeting,
    })))
}

/// `POST /meetings/join`
pub async fn join<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
    JsonBody(body): JsonBody<JoinByCode>,
) -> Result<Json<Value>, AppError> {
    let summary = state
        .meetings
        .join_by_code(&body.meeting_code, &user.user_id)
        .await?;
    Ok(Json(json!({ "success": true, "meeting": summary })))
}
