//! Shared auth state, the `CurrentUser` extractor and error responses.

use std::sync::Arc;

use axum::{
    Json,
    extract::{FromRef, FromRequestParts},
    http::{HeaderValue, StatusCode, header::WWW_AUTHENTICATE, request::Parts},
    response::{IntoResponse, Response},
};
use secrecy::SecretString;
use serde::Serialize;
use tasknest_core::AuthConfig;

use super::{AuthError, TokenError};
use super::jwt::TokenCodec;
use super::password::PasswordHasher;
use super::resolver::{Resolution, SessionResolver, TokenSources};
use super::users::{User, UserStore};

/// Shared authentication state.
pub struct AuthState {
    /// Auth configuration.
    pub config: AuthConfig,
    /// Token codec.
    pub codec: TokenCodec,
    /// Password hasher.
    pub hasher: PasswordHasher,
    /// User store.
    pub users: UserStore,
}

impl AuthState {
    /// Create a new auth state.
    #[must_use]
    pub const fn new(
        config: AuthConfig,
        codec: TokenCodec,
        hasher: PasswordHasher,
        users: UserStore,
    ) -> Self {
        Self {
            config,
            codec,
            hasher,
            users,
        }
    }

    /// Initialize auth state, auto-generating the JWT secret if needed.
    ///
    /// # Errors
    ///
    /// Returns error if the secret or hasher parameters are invalid, or the
    /// user tree cannot be opened.
    pub fn initialize(mut config: AuthConfig, db: sled::Db) -> Result<Self, AuthError> {
        let users = UserStore::with_db(db)?;

        let secret = match config.jwt_secret.take() {
            Some(secret) => SecretString::from(secret),
            None => {
                // Sessions do not survive a restart without a configured secret
                tracing::info!("Generated new JWT secret");
                TokenCodec::generate_hex_secret()
            }
        };

        let codec = TokenCodec::from_hex_secret(&secret)?;
        let hasher = PasswordHasher::new(config.hasher)?;

        Ok(Self::new(config, codec, hasher, users))
    }

    /// A resolver bound to this state's codec and user store.
    #[must_use]
    pub const fn resolver(&self) -> SessionResolver<'_> {
        SessionResolver::new(&self.codec, &self.users)
    }

    /// Token sources the boundary gate accepts.
    #[must_use]
    pub const fn gate_sources(&self) -> TokenSources {
        if self.config.gate_accepts_bearer {
            TokenSources::COOKIE_OR_HEADER
        } else {
            TokenSources::COOKIE_ONLY
        }
    }

    /// Check a username and password.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCredentials` for an unknown user or wrong password.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let user = self
            .users
            .get_by_username(username)?
            .ok_or(AuthError::InvalidCredentials)?;

        if !self.hasher.verify(password, &user.password_hash) {
            return Err(AuthError::InvalidCredentials);
        }
        Ok(user)
    }

    /// Issue a token lasting one configured session.
    ///
    /// # Errors
    ///
    /// Returns error if token encoding fails.
    pub fn issue_session(&self, user: &User) -> Result<String, AuthError> {
        self.codec
            .issue(&user.username, Some(self.config.session_lifetime()))
    }
}

impl std::fmt::Debug for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthState")
            .field("config", &self.config)
            .field("user_count", &self.users.count())
            .finish_non_exhaustive()
    }
}

/// Extractor for the authenticated user.
///
/// Reads the identity attached by the boundary gate. Routes the gate lets
/// through without one (such as `/token` callers hitting an API) are resolved
/// independently from the cookie or the bearer header.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    Arc<AuthState>: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = Arc::<AuthState>::from_ref(state);
        match auth.resolver().resolve(
            &parts.headers,
            &parts.extensions,
            TokenSources::COOKIE_OR_HEADER,
        )? {
            Resolution::Authenticated(user) => Ok(Self(user)),
            Resolution::Anonymous => Err(AuthError::Unauthenticated),
        }
    }
}

/// Error response for auth failures.
#[derive(Debug, Serialize)]
struct AuthErrorResponse {
    detail: String,
    code: &'static str,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            Self::Token(TokenError::Encoding(_))
            | Self::Storage(_)
            | Self::Config(_)
            | Self::Hashing(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            Self::InvalidCredentials => (StatusCode::UNAUTHORIZED, "invalid_credentials"),
            Self::Token(_) | Self::UserNotFound(_) => (StatusCode::UNAUTHORIZED, "invalid_token"),
            Self::Unauthenticated => (StatusCode::UNAUTHORIZED, "not_authenticated"),
            Self::UserExists(_) | Self::EmailExists(_) => (StatusCode::CONFLICT, "already_registered"),
        };

        let detail = match &self {
            _ if status == StatusCode::INTERNAL_SERVER_ERROR => {
                tracing::error!(error = %self, "Auth internal error");
                "Internal server error".to_string()
            }
            // Stale or forged sessions look the same to the client
            Self::Token(_) | Self::UserNotFound(_) => "Could not validate credentials".to_string(),
            _ => self.to_string(),
        };

        let mut response = (status, Json(AuthErrorResponse { detail, code })).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{NewUser, RequestIdentity, TokenError};
    use axum::http::Request;
    use tasknest_core::HasherConfig;
    use tempfile::TempDir;

    fn state(config: AuthConfig) -> (TempDir, Arc<AuthState>) {
        let dir = TempDir::new().unwrap();
        let db = sled::open(dir.path()).unwrap();
        (dir, Arc::new(AuthState::initialize(config, db).unwrap()))
    }

    fn fast_config() -> AuthConfig {
        AuthConfig::builder()
            .hasher(HasherConfig::insecure_fast())
            .build()
    }

    fn register(auth: &AuthState, username: &str, password: &str) -> User {
        auth.users
            .create(NewUser {
                username: username.to_string(),
                email: format!("{username}@example.com"),
                full_name: None,
                password_hash: auth.hasher.hash(password).unwrap(),
            })
            .unwrap()
    }

    #[test]
    fn test_initialize_generates_secret() {
        let (_dir, auth) = state(fast_config());
        let token = auth.codec.issue("alice", None).unwrap();
        assert!(auth.codec.verify(&token).is_ok());
        // The secret never stays in the config copy
        assert!(auth.config.jwt_secret.is_none());
    }

    #[test]
    fn test_initialize_rejects_bad_secret() {
        let dir = TempDir::new().unwrap();
        let db = sled::open(dir.path()).unwrap();
        let config = AuthConfig::builder().jwt_secret("zz").build();
        assert!(matches!(
            AuthState::initialize(config, db),
            Err(AuthError::Config(_))
        ));
    }

    #[test]
    fn test_issue_session_with_unbounded_lifetime_errors() {
        let config = AuthConfig::builder()
            .hasher(HasherConfig::insecure_fast())
            .session_minutes(200_000_000_000)
            .build();
        let (_dir, auth) = state(config);
        let user = register(&auth, "alice", "password123");

        let err = auth.issue_session(&user).unwrap_err();
        assert!(matches!(err, AuthError::Token(TokenError::Encoding(_))));
        assert!(!err.is_unauthorized());
    }

    #[test]
    fn test_authenticate() {
        let (_dir, auth) = state(fast_config());
        let user = register(&auth, "alice", "password123");

        assert_eq!(auth.authenticate("alice", "password123").unwrap().id, user.id);
        assert!(matches!(
            auth.authenticate("alice", "nope"),
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.authenticate("nobody", "password123"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_issue_session_uses_configured_lifetime() {
        let (_dir, auth) = state(fast_config());
        let user = register(&auth, "alice", "password123");

        let token = auth.issue_session(&user).unwrap();
        let claims = auth.codec.verify(&token).unwrap();
        assert_eq!(claims.exp - claims.iat, 1800);
    }

    #[test]
    fn test_gate_sources() {
        let (_dir, auth) = state(fast_config());
        assert_eq!(auth.gate_sources(), TokenSources::COOKIE_ONLY);

        let (_dir, auth) = state(
            AuthConfig::builder()
                .hasher(HasherConfig::insecure_fast())
                .gate_accepts_bearer(true)
                .build(),
        );
        assert_eq!(auth.gate_sources(), TokenSources::COOKIE_OR_HEADER);
    }

    #[tokio::test]
    async fn test_current_user_from_header() {
        let (_dir, auth) = state(fast_config());
        let user = register(&auth, "alice", "password123");
        let token = auth.issue_session(&user).unwrap();

        let (mut parts, ()) = Request::builder()
            .header("authorization", format!("Bearer {token}"))
            .body(())
            .unwrap()
            .into_parts();

        let CurrentUser(found) = CurrentUser::from_request_parts(&mut parts, &auth)
            .await
            .unwrap();
        assert_eq!(found.id, user.id);
    }

    #[tokio::test]
    async fn test_current_user_prefers_attached_identity() {
        let (_dir, auth) = state(fast_config());
        let user = register(&auth, "alice", "password123");

        let (mut parts, ()) = Request::builder().body(()).unwrap().into_parts();
        parts.extensions.insert(RequestIdentity { user: user.clone() });

        let CurrentUser(found) = CurrentUser::from_request_parts(&mut parts, &auth)
            .await
            .unwrap();
        assert_eq!(found, user);
    }

    #[tokio::test]
    async fn test_current_user_anonymous() {
        let (_dir, auth) = state(fast_config());
        let (mut parts, ()) = Request::builder().body(()).unwrap().into_parts();

        let result = CurrentUser::from_request_parts(&mut parts, &auth).await;
        assert!(matches!(result, Err(AuthError::Unauthenticated)));
    }

    #[test]
    fn test_error_responses() {
        let response = AuthError::Token(TokenError::Expired).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[WWW_AUTHENTICATE], "Bearer");

        let response = AuthError::UserExists("alice".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert!(response.headers().get(WWW_AUTHENTICATE).is_none());

        let response = AuthError::Storage("disk".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = AuthError::Token(TokenError::Encoding("range".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().get(WWW_AUTHENTICATE).is_none());
    }
}
