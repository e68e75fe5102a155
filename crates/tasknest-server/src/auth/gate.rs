//! Boundary gate middleware.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use super::middleware::AuthState;
use super::resolver::{RequestIdentity, Resolution};

/// Guard every non-public path.
///
/// Public paths pass through untouched. Protected paths need a session that
/// resolves to a stored user; the identity is attached to the request for
/// handlers. Any failure redirects to `/login` with `303 See Other`.
pub async fn boundary_gate(
    State(auth): State<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path();
    if auth.config.is_public_path(path) {
        return next.run(request).await;
    }

    let resolution = auth.resolver().resolve(
        request.headers(),
        request.extensions(),
        auth.gate_sources(),
    );

    match resolution {
        Ok(Resolution::Authenticated(user)) => {
            request.extensions_mut().insert(RequestIdentity { user });
            next.run(request).await
        }
        Ok(Resolution::Anonymous) => {
            tracing::debug!(path = %request.uri().path(), "No session, redirecting to login");
            Redirect::to("/login").into_response()
        }
        Err(e) => {
            tracing::debug!(path = %request.uri().path(), error = %e, "Session rejected, redirecting to login");
            Redirect::to("/login").into_response()
        }
    }
}
