//! JWT token issuance and verification.

use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{AuthError, TokenError};

/// Lifetime used when the caller doesn't pass one.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(15 * 60);

const BEARER_SCHEME: &str = "Bearer ";

/// JWT claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (username).
    pub sub: String,
    /// Issued at (Unix timestamp).
    pub iat: i64,
    /// Expiration (Unix timestamp).
    pub exp: i64,
}

/// Signs and verifies HS256 access tokens.
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    /// Create a codec with a raw secret key.
    ///
    /// The secret should be at least 32 bytes for security.
    #[must_use]
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_nbf = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Create a codec from a hex-encoded secret.
    ///
    /// # Errors
    ///
    /// Returns error if hex decoding fails.
    pub fn from_hex_secret(hex_secret: &SecretString) -> Result<Self, AuthError> {
        let secret = hex::decode(hex_secret.expose_secret())
            .map_err(|e| AuthError::Config(format!("Invalid hex secret: {e}")))?;
        Ok(Self::new(&secret))
    }

    /// Generate a random 256-bit secret key.
    #[must_use]
    pub fn generate_secret() -> [u8; 32] {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        bytes
    }

    /// Generate a random secret as hex string.
    #[must_use]
    pub fn generate_hex_secret() -> SecretString {
        SecretString::from(hex::encode(Self::generate_secret()))
    }

    /// Issue a token for `subject`, valid for `ttl` (default 15 minutes).
    ///
    /// # Errors
    ///
    /// Returns error if token encoding fails.
    pub fn issue(&self, subject: &str, ttl: Option<Duration>) -> Result<String, AuthError> {
        self.issue_at(subject, Utc::now(), ttl)
    }

    /// Issue a token as if the current time were `now`.
    ///
    /// # Errors
    ///
    /// Returns error if `now + ttl` is out of range or token encoding fails.
    pub fn issue_at(
        &self,
        subject: &str,
        now: DateTime<Utc>,
        ttl: Option<Duration>,
    ) -> Result<String, AuthError> {
        let ttl = ttl.unwrap_or(DEFAULT_TOKEN_TTL);
        let exp = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| TokenError::Encoding(format!("token lifetime out of range: {ttl:?}")))?;

        let claims = Claims {
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Encoding(e.to_string()).into())
    }

    /// Verify a raw token and return its claims.
    ///
    /// The raw value may carry a `Bearer ` scheme tag and surrounding quotes,
    /// as it does in the session cookie and the `Authorization` header.
    /// The signature is checked before expiry, so a token signed with another
    /// key is always `InvalidSignature`.
    ///
    /// # Errors
    ///
    /// Returns `Malformed`, `InvalidSignature` or `Expired`.
    pub fn verify(&self, raw: &str) -> Result<Claims, TokenError> {
        let token = Self::normalize(raw);
        if token.is_empty() {
            return Err(TokenError::Malformed);
        }

        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed,
            })
    }

    /// Strip quotes and one leading bearer scheme tag.
    #[must_use]
    pub fn normalize(raw: &str) -> &str {
        let trimmed = raw.trim();
        let unquoted = trimmed
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .unwrap_or(trimmed);

        match unquoted.get(..BEARER_SCHEME.len()) {
            Some(scheme) if scheme.eq_ignore_ascii_case(BEARER_SCHEME) => {
                unquoted[BEARER_SCHEME.len()..].trim()
            }
            _ => unquoted.trim(),
        }
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &"HS256")
            .finish_non_exhaustive()
    }
}
