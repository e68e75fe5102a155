//! HTTP handlers.
//!
//! Page handlers render HTML from [`crate::views`]; the `api` handlers return
//! JSON. Every storage call is scoped to the current user's id.

pub mod api;
pub mod auth;
pub mod labels;
pub mod pages;
pub mod subjects;
pub mod tasks;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::NaiveDateTime;
use tasknest_core::{StoreError, ValidationError};
use thiserror::Error;

use crate::auth::AuthError;
use crate::views;

/// Handler errors.
#[derive(Debug, Error)]
pub enum AppError {
    /// Record missing or owned by another user.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Authentication failure.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Storage failure.
    #[error(transparent)]
    Store(StoreError),

    /// Rejected input outside a form that can re-render it.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => Self::NotFound(what),
            other => Self::Store(other),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, views::not_found()).into_response(),
            Self::Auth(e) => e.into_response(),
            Self::Store(StoreError::Conflict(message)) => {
                (StatusCode::CONFLICT, views::error(&message)).into_response()
            }
            Self::Store(e) => {
                tracing::error!(error = %e, "Storage error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    views::error("Internal server error"),
                )
                    .into_response()
            }
            Self::Validation(e) => (StatusCode::BAD_REQUEST, views::error(&e.to_string())).into_response(),
        }
    }
}

/// Handler result type.
pub type AppResult<T> = Result<T, AppError>;

/// Local wall-clock time, the reference for due dates.
pub(crate) fn now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

/// Fallback for unknown routes.
pub async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, views::not_found()).into_response()
}
