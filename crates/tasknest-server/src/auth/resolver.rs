//! Per-request session resolution.

use axum::http::{Extensions, HeaderMap};

use super::cookie::{bearer_header, session_cookie};
use super::jwt::TokenCodec;
use super::users::{User, UserStore};
use super::AuthError;

/// The user resolved for the current request.
///
/// Inserted into request extensions by the boundary gate.
#[derive(Debug, Clone)]
pub struct RequestIdentity {
    /// The authenticated user.
    pub user: User,
}

/// Where the resolver may look for a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenSources {
    /// The `access_token` cookie.
    pub cookie: bool,
    /// The `Authorization: Bearer` header.
    pub header: bool,
}

impl TokenSources {
    /// Cookie only.
    pub const COOKIE_ONLY: Self = Self {
        cookie: true,
        header: false,
    };

    /// Cookie first, then the bearer header.
    pub const COOKIE_OR_HEADER: Self = Self {
        cookie: true,
        header: true,
    };
}

/// Outcome of a resolution that didn't fail.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// A valid token named an existing user.
    Authenticated(User),
    /// No token was presented.
    Anonymous,
}

/// Resolves a request to a stored user.
#[derive(Debug, Clone, Copy)]
pub struct SessionResolver<'a> {
    codec: &'a TokenCodec,
    users: &'a UserStore,
}

impl<'a> SessionResolver<'a> {
    /// Create a resolver over a codec and a user store.
    #[must_use]
    pub const fn new(codec: &'a TokenCodec, users: &'a UserStore) -> Self {
        Self { codec, users }
    }

    /// Resolve the request's identity.
    ///
    /// An identity already attached to `extensions` wins without another
    /// verification. Otherwise the cookie is tried, then (if allowed) the
    /// bearer header. No token at all is `Anonymous`; a token that fails
    /// verification or names a missing user is an error.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Token` for a rejected token, `UserNotFound` for a
    /// deleted subject, or a storage error.
    pub fn resolve(
        &self,
        headers: &HeaderMap,
        extensions: &Extensions,
        sources: TokenSources,
    ) -> Result<Resolution, AuthError> {
        if let Some(identity) = extensions.get::<RequestIdentity>() {
            return Ok(Resolution::Authenticated(identity.user.clone()));
        }

        let Some(raw) = Self::find_token(headers, sources) else {
            return Ok(Resolution::Anonymous);
        };

        self.user_for_token(raw).map(Resolution::Authenticated)
    }

    fn find_token(headers: &HeaderMap, sources: TokenSources) -> Option<&str> {
        let cookie = sources.cookie.then(|| session_cookie(headers)).flatten();
        cookie.or_else(|| sources.header.then(|| bearer_header(headers)).flatten())
    }

    /// Verify a raw token and load its subject.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Token` or `AuthError::UserNotFound`.
    pub fn user_for_token(&self, raw: &str) -> Result<User, AuthError> {
        let claims = self.codec.verify(raw)?;

        self.users
            .get_by_username(&claims.sub)?
            .ok_or(AuthError::UserNotFound(claims.sub))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{NewUser, TokenError};
    use axum::http::HeaderValue;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        codec: TokenCodec,
        users: UserStore,
        user: User,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let users = UserStore::with_db(sled::open(dir.path()).unwrap()).unwrap();
        let user = users
            .create(NewUser {
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
                full_name: None,
                password_hash: String::new(),
            })
            .unwrap();
        Fixture {
            _dir: dir,
            codec: TokenCodec::new(&TokenCodec::generate_secret()),
            users,
            user,
        }
    }

    fn cookie_headers(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            "cookie",
            HeaderValue::from_str(&format!("access_token=\"Bearer {token}\"")).unwrap(),
        );
        headers
    }

    fn bearer_headers(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    #[test]
    fn test_no_token_is_anonymous() {
        let f = fixture();
        let resolver = SessionResolver::new(&f.codec, &f.users);
        let result = resolver
            .resolve(&HeaderMap::new(), &Extensions::new(), TokenSources::COOKIE_OR_HEADER)
            .unwrap();
        assert!(matches!(result, Resolution::Anonymous));
    }

    #[test]
    fn test_cookie_resolves_user() {
        let f = fixture();
        let resolver = SessionResolver::new(&f.codec, &f.users);
        let token = f.codec.issue("alice", Some(Duration::from_secs(1800))).unwrap();

        let result = resolver
            .resolve(&cookie_headers(&token), &Extensions::new(), TokenSources::COOKIE_ONLY)
            .unwrap();
        match result {
            Resolution::Authenticated(user) => assert_eq!(user.id, f.user.id),
            Resolution::Anonymous => panic!("expected authenticated"),
        }
    }

    #[test]
    fn test_header_respects_sources() {
        let f = fixture();
        let resolver = SessionResolver::new(&f.codec, &f.users);
        let token = f.codec.issue("alice", None).unwrap();
        let headers = bearer_headers(&token);

        let cookie_only = resolver
            .resolve(&headers, &Extensions::new(), TokenSources::COOKIE_ONLY)
            .unwrap();
        assert!(matches!(cookie_only, Resolution::Anonymous));

        let either = resolver
            .resolve(&headers, &Extensions::new(), TokenSources::COOKIE_OR_HEADER)
            .unwrap();
        assert!(matches!(either, Resolution::Authenticated(_)));
    }

    #[test]
    fn test_cookie_takes_precedence() {
        let f = fixture();
        let resolver = SessionResolver::new(&f.codec, &f.users);
        let good = f.codec.issue("alice", None).unwrap();

        let mut headers = cookie_headers("not-a-token");
        headers.insert(
            "authorization",
            HeaderValue::from_str(&format!("Bearer {good}")).unwrap(),
        );

        let result = resolver.resolve(&headers, &Extensions::new(), TokenSources::COOKIE_OR_HEADER);
        assert!(matches!(result, Err(AuthError::Token(TokenError::Malformed))));
    }

    #[test]
    fn test_invalid_token_is_error() {
        let f = fixture();
        let resolver = SessionResolver::new(&f.codec, &f.users);
        let foreign = TokenCodec::new(b"another-secret-another-secret!!!")
            .issue("alice", None)
            .unwrap();

        let result = resolver.resolve(
            &cookie_headers(&foreign),
            &Extensions::new(),
            TokenSources::COOKIE_ONLY,
        );
        assert!(matches!(
            result,
            Err(AuthError::Token(TokenError::InvalidSignature))
        ));
    }

    #[test]
    fn test_deleted_user_is_not_found() {
        let f = fixture();
        let resolver = SessionResolver::new(&f.codec, &f.users);
        let token = f.codec.issue("alice", None).unwrap();
        f.users.delete(f.user.id).unwrap();

        let result = resolver.resolve(
            &cookie_headers(&token),
            &Extensions::new(),
            TokenSources::COOKIE_ONLY,
        );
        assert!(matches!(result, Err(AuthError::UserNotFound(name)) if name == "alice"));
    }

    #[test]
    fn test_attached_identity_short_circuits() {
        let f = fixture();
        let resolver = SessionResolver::new(&f.codec, &f.users);

        let mut extensions = Extensions::new();
        extensions.insert(RequestIdentity {
            user: f.user.clone(),
        });

        // A bad cookie is never looked at
        let result = resolver
            .resolve(&cookie_headers("garbage"), &extensions, TokenSources::COOKIE_ONLY)
            .unwrap();
        assert!(matches!(result, Resolution::Authenticated(u) if u.id == f.user.id));
    }
}
