// ============================
// crates/backend-lib/src/auth/extract.rs
// ============================
use axum::{extract::FromRequestParts, http::request::Parts};
use std::sync::Arc;

use crate::error::AppError;
use crate::storage::Storage;
use crate::AppState;

/// Caller identity taken from an `Authorization: Bearer <token>` header
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub user_id: String,
}

impl<S: Storage + Clone + 'static> FromRequestParts<Arc<AppState<S>>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S>>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("missing Authorization header".to_string()))?;

        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AppError::Unauthorized("expected a bearer token".to_string()))?;

        let claims = state.tokens.verify(token).inspect_err(|e| {
            tracing::debug!(error = %e, "rejected bearer token");
        })?;

        Ok(AuthUser { user_id: claims.id })
    }
}
