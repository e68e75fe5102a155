//! Authentication and request authorization.
//!
//! This module provides:
//! - Argon2id password hashing
//! - HS256 token issuance and verification
//! - The user credential store
//! - Per-request session resolution from cookie or bearer header
//! - The boundary gate middleware that guards protected paths

pub mod cookie;
mod gate;
mod jwt;
mod middleware;
mod password;
mod resolver;
mod users;

pub use gate::boundary_gate;
pub use jwt::{Claims, DEFAULT_TOKEN_TTL, TokenCodec};
pub use middleware::{AuthState, CurrentUser};
pub use password::PasswordHasher;
pub use resolver::{RequestIdentity, Resolution, SessionResolver, TokenSources};
pub use users::{NewUser, PublicUser, User, UserStore};

use thiserror::Error;

/// Token verification failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Structure could not be parsed.
    #[error("Malformed token")]
    Malformed,

    /// Signature does not match the server key.
    #[error("Invalid token signature")]
    InvalidSignature,

    /// Signature is valid but `exp` has passed.
    #[error("Token expired")]
    Expired,

    /// Token could not be signed.
    #[error("Token encoding failed: {0}")]
    Encoding(String),
}

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid credentials provided.
    #[error("Incorrect username or password")]
    InvalidCredentials,

    /// Token was present but rejected.
    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    /// Token subject no longer exists.
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// Username already taken.
    #[error("Username already registered: {0}")]
    UserExists(String),

    /// Email already taken.
    #[error("Email already registered: {0}")]
    EmailExists(String),

    /// No credential presented.
    #[error("Not authenticated")]
    Unauthenticated,

    /// Storage error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// Password hashing failed.
    #[error("Password hashing failed: {0}")]
    Hashing(String),
}

impl AuthError {
    /// Whether this is a rejected or missing credential rather than a server fault.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredentials
                | Self::UserNotFound(_)
                | Self::Unauthenticated
                | Self::Token(
                    TokenError::Malformed | TokenError::InvalidSignature | TokenError::Expired
                )
        )
    }
}

impl From<sled::Error> for AuthError {
    fn from(e: sled::Error) -> Self {
        Self::Storage(e.to_string())
    }
}
