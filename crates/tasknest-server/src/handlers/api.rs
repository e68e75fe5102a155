//! JSON endpoints for token-authenticated clients.

use axum::{Json, extract::State};
use tasknest_core::types::{Label, Subject};

use super::AppResult;
use crate::auth::{CurrentUser, PublicUser};
use crate::server::AppState;

/// `GET /api/me`
pub async fn me(CurrentUser(user): CurrentUser) -> Json<PublicUser> {
    Json(user.to_public())
}

/// `GET /api/subjects`
pub async fn subjects(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<Subject>>> {
    Ok(Json(state.tasks.list_subjects(user.id)?))
}

/// `GET /api/labels`
pub async fn labels(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<Label>>> {
    Ok(Json(state.tasks.list_labels(user.id)?))
}
