//! Login, registration, logout and the token endpoint.

use axum::{
    Form, Json,
    extract::{Query, State},
    http::header::SET_COOKIE,
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use tasknest_core::validation::{self, limits};

use super::AppResult;
use crate::auth::cookie::{clear_session_cookie, set_session_cookie};
use crate::auth::{AuthError, NewUser};
use crate::server::AppState;
use crate::views;

/// Username and password, as posted by the login form and `/token` clients.
#[derive(Debug, Deserialize)]
pub struct CredentialsForm {
    /// Username.
    #[serde(default)]
    pub username: String,
    /// Plaintext password.
    #[serde(default)]
    pub password: String,
}

/// Registration form.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    /// Desired username.
    #[serde(default)]
    pub username: String,
    /// Email address.
    #[serde(default)]
    pub email: String,
    /// Optional display name.
    #[serde(default)]
    pub full_name: String,
    /// Plaintext password.
    #[serde(default)]
    pub password: String,
}

/// `?message=` on the login page.
#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    message: Option<String>,
}

/// Body returned by `POST /token`.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    /// The signed token.
    pub access_token: String,
    /// Always `"bearer"`.
    pub token_type: String,
}

// Only known codes are shown so arbitrary text is never reflected.
fn banner(code: &str) -> Option<&'static str> {
    match code {
        "registered" => Some("Registration successful. Please log in."),
        "logged_out" => Some("You have been logged out."),
        _ => None,
    }
}

/// `GET /login`
pub async fn login_page(Query(query): Query<LoginQuery>) -> Html<String> {
    views::login(None, query.message.as_deref().and_then(banner))
}

/// `POST /login`
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<CredentialsForm>,
) -> AppResult<Response> {
    let auth = &state.auth;
    let user = match auth.authenticate(form.username.trim(), &form.password) {
        Ok(user) => user,
        Err(AuthError::InvalidCredentials) => {
            tracing::debug!(username = %form.username.trim(), "Login rejected");
            return Ok(views::login(Some("Incorrect username or password"), None).into_response());
        }
        Err(e) => return Err(e.into()),
    };

    let token = auth.issue_session(&user)?;
    let cookie = set_session_cookie(&token, auth.config.session_lifetime())
        .map_err(|e| AuthError::Config(e.to_string()))?;

    tracing::info!(username = %user.username, "User logged in");
    let mut response = Redirect::to("/dashboard").into_response();
    response.headers_mut().insert(SET_COOKIE, cookie);
    Ok(response)
}

/// `GET /register`
pub async fn register_page() -> Html<String> {
    views::register(None, "", "", "")
}

/// `POST /register`
pub async fn register(
    State(state): State<AppState>,
    Form(form): Form<RegisterForm>,
) -> AppResult<Response> {
    let rerender = |error: &str| -> AppResult<Response> {
        Ok(views::register(Some(error), &form.username, &form.email, &form.full_name).into_response())
    };

    let checked = validation::validate_username(&form.username).and_then(|username| {
        let email = validation::validate_email(&form.email)?;
        validation::validate_password(&form.password)?;
        let full_name =
            validation::optional_text("Full name", Some(&form.full_name), limits::MAX_FULL_NAME)?;
        Ok((username, email, full_name))
    });
    let (username, email, full_name) = match checked {
        Ok(values) => values,
        Err(e) => return rerender(&e.to_string()),
    };

    let auth = &state.auth;
    let password_hash = auth.hasher.hash(&form.password)?;
    match auth.users.create(NewUser {
        username,
        email,
        full_name,
        password_hash,
    }) {
        Ok(user) => {
            tracing::info!(username = %user.username, "User registered");
            Ok(Redirect::to("/login?message=registered").into_response())
        }
        Err(AuthError::UserExists(_)) => rerender("Username already registered"),
        Err(AuthError::EmailExists(_)) => rerender("Email already registered"),
        Err(e) => Err(e.into()),
    }
}

/// `POST /token`
///
/// Failures surface as `401` JSON with `WWW-Authenticate: Bearer`.
pub async fn token(
    State(state): State<AppState>,
    Form(form): Form<CredentialsForm>,
) -> Result<Json<TokenResponse>, AuthError> {
    let auth = &state.auth;
    let user = auth.authenticate(form.username.trim(), &form.password)?;
    let access_token = auth.issue_session(&user)?;

    tracing::debug!(username = %user.username, "Issued API token");
    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
    }))
}

/// `GET /logout`
///
/// Only the client's copy of the token is discarded.
pub async fn logout() -> Response {
    let mut response = Redirect::to("/login?message=logged_out").into_response();
    response
        .headers_mut()
        .insert(SET_COOKIE, clear_session_cookie());
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_banner_codes() {
        assert!(banner("registered").is_some());
        assert!(banner("logged_out").is_some());
        assert!(banner("<script>").is_none());
    }

    #[tokio::test]
    async fn test_logout_clears_cookie() {
        let response = logout().await;
        assert_eq!(response.status(), axum::http::StatusCode::SEE_OTHER);
        let cookie = response.headers()[SET_COOKIE].to_str().unwrap();
        assert!(cookie.contains("Max-Age=0"));
    }
}
