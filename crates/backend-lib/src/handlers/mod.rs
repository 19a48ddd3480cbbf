// ============================
// crates/backend-lib/src/handlers/mod.rs
// ============================
//! REST handlers.

pub mod meetings;
pub mod messages;

use axum::{
    extract::{FromRequest, FromRequestParts, State},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::AppError;
use crate::storage::Storage;
use crate::AppState;

/// JSON body whose rejection is rendered like every other [`AppError`]
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

/// Query string whose rejection is rendered like every other [`AppError`]
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct QueryParams<T>(pub T);

/// Liveness probe with a snapshot of real-time load
pub async fn health<S: Storage + Clone + 'static>(State(state): State<Arc<AppState<S>>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "connections": state.connections.len(),
        "rooms": state.rooms.room_count(),
    }))
}
