//! Overview pages.

use axum::{
    Json,
    extract::State,
    response::{Html, Redirect},
};
use serde_json::{Value, json};

use super::{AppResult, now};
use crate::auth::CurrentUser;
use crate::server::AppState;
use crate::views::{self, ProfileCounts};

/// `GET /`
pub async fn index() -> Redirect {
    Redirect::to("/login")
}

/// `GET /health`
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `GET /dashboard`
pub async fn dashboard(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Html<String>> {
    let now = now();
    let dashboard = state.tasks.dashboard(user.id, now)?;
    let subjects = state.tasks.list_subjects(user.id)?;
    Ok(views::dashboard(&user, &dashboard, &subjects, now))
}

/// `GET /notifications`
pub async fn notifications(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Html<String>> {
    let now = now();
    let notes = state.tasks.notifications(user.id, now)?;
    let subjects = state.tasks.list_subjects(user.id)?;
    Ok(views::notifications(&user, &notes, &subjects, now))
}

/// `GET /profile`
pub async fn profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Html<String>> {
    let counts = ProfileCounts {
        subjects: state.tasks.list_subjects(user.id)?.len(),
        labels: state.tasks.list_labels(user.id)?.len(),
        tasks: state.tasks.task_counts(user.id)?.values().sum(),
        open_tasks: state.tasks.count_open(user.id)?,
    };
    Ok(views::profile(&user, counts))
}
