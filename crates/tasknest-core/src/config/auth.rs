//! Authentication configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default browser session lifetime in minutes.
pub const DEFAULT_SESSION_MINUTES: u64 = 30;

/// Paths reachable without a session.
///
/// `/` matches only the root itself; every other entry is a prefix.
pub const DEFAULT_PUBLIC_PATHS: &[&str] = &[
    "/",
    "/login",
    "/register",
    "/static",
    "/docs",
    "/redoc",
    "/openapi.json",
    "/token",
    "/health",
];

/// Longest accepted session lifetime (one year).
pub const MAX_SESSION_MINUTES: u64 = 366 * 24 * 60;

/// Minimum accepted length of a hex-encoded JWT secret (16 bytes).
const MIN_SECRET_HEX_LEN: usize = 32;

/// Authentication configuration.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfig {
    /// JWT signing secret (hex-encoded). Generated at startup if not set.
    #[serde(default)]
    pub jwt_secret: Option<String>,

    /// Session cookie and login token lifetime in minutes.
    #[serde(default = "default_session_minutes")]
    pub session_minutes: u64,

    /// Let the boundary gate accept `Authorization: Bearer` as well as the cookie.
    #[serde(default)]
    pub gate_accepts_bearer: bool,

    /// Path allow-list for unauthenticated requests.
    #[serde(default = "default_public_paths")]
    pub public_paths: Vec<String>,

    /// Password hashing cost parameters.
    #[serde(default)]
    pub hasher: HasherConfig,
}

/// Argon2 cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HasherConfig {
    /// Memory cost in KiB.
    #[serde(default = "default_memory_kib")]
    pub memory_kib: u32,

    /// Number of passes.
    #[serde(default = "default_iterations")]
    pub iterations: u32,

    /// Degree of parallelism.
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
}

impl Default for HasherConfig {
    fn default() -> Self {
        Self {
            memory_kib: default_memory_kib(),
            iterations: default_iterations(),
            parallelism: default_parallelism(),
        }
    }
}

impl HasherConfig {
    /// Cheap parameters for tests. Never use in production.
    #[must_use]
    pub const fn insecure_fast() -> Self {
        Self {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        }
    }
}

// Argon2id defaults from the argon2 crate
const fn default_memory_kib() -> u32 {
    19 * 1024
}

const fn default_iterations() -> u32 {
    2
}

const fn default_parallelism() -> u32 {
    1
}

const fn default_session_minutes() -> u64 {
    DEFAULT_SESSION_MINUTES
}

fn default_public_paths() -> Vec<String> {
    DEFAULT_PUBLIC_PATHS.iter().map(|p| (*p).to_string()).collect()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            session_minutes: default_session_minutes(),
            gate_accepts_bearer: false,
            public_paths: default_public_paths(),
            hasher: HasherConfig::default(),
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "[REDACTED]"))
            .field("session_minutes", &self.session_minutes)
            .field("gate_accepts_bearer", &self.gate_accepts_bearer)
            .field("public_paths", &self.public_paths)
            .field("hasher", &self.hasher)
            .finish()
    }
}

impl AuthConfig {
    /// Create a new auth config builder.
    #[must_use]
    pub fn builder() -> AuthConfigBuilder {
        AuthConfigBuilder::default()
    }

    /// Session lifetime as Duration, saturating on overflow.
    #[must_use]
    pub const fn session_lifetime(&self) -> Duration {
        match self.session_minutes.checked_mul(60) {
            Some(secs) => Duration::from_secs(secs),
            None => Duration::MAX,
        }
    }

    /// Check if a request path is public (doesn't require a session).
    #[must_use]
    pub fn is_public_path(&self, path: &str) -> bool {
        self.public_paths.iter().any(|public| {
            if public == "/" {
                path == "/"
            } else {
                path.starts_with(public.as_str())
            }
        })
    }

    /// Load overrides from environment variables.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(secret) = std::env::var("TASKNEST_JWT_SECRET") {
            if !secret.is_empty() {
                self.jwt_secret = Some(secret);
            }
        }

        if let Ok(flag) = std::env::var("TASKNEST_GATE_ACCEPTS_BEARER") {
            self.gate_accepts_bearer = flag == "1" || flag.eq_ignore_ascii_case("true");
        }

        self
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.session_minutes == 0 {
            return Err("Session lifetime must be at least 1 minute".to_string());
        }
        if self.session_minutes > MAX_SESSION_MINUTES {
            return Err(format!(
                "Session lifetime must be at most {MAX_SESSION_MINUTES} minutes"
            ));
        }

        if let Some(secret) = &self.jwt_secret {
            if secret.len() < MIN_SECRET_HEX_LEN
                || secret.len() % 2 != 0
                || !secret.chars().all(|c| c.is_ascii_hexdigit())
            {
                return Err(format!(
                    "JWT secret must be hex-encoded and at least {MIN_SECRET_HEX_LEN} characters"
                ));
            }
        }

        let HasherConfig {
            memory_kib,
            iterations,
            parallelism,
        } = self.hasher;
        if memory_kib < 8 * parallelism || iterations == 0 || parallelism == 0 {
            return Err("Invalid password hasher parameters".to_string());
        }

        Ok(())
    }
}

/// Builder for `AuthConfig`.
#[derive(Debug, Default)]
pub struct AuthConfigBuilder {
    config: AuthConfig,
}

impl AuthConfigBuilder {
    /// Set the JWT secret.
    #[must_use]
    pub fn jwt_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.jwt_secret = Some(secret.into());
        self
    }

    /// Set the session lifetime in minutes.
    #[must_use]
    pub const fn session_minutes(mut self, minutes: u64) -> Self {
        self.config.session_minutes = minutes;
        self
    }

    /// Set whether the gate also accepts bearer headers.
    #[must_use]
    pub const fn gate_accepts_bearer(mut self, accepts: bool) -> Self {
        self.config.gate_accepts_bearer = accepts;
        self
    }

    /// Add a public path prefix.
    #[must_use]
    pub fn public_path(mut self, path: impl Into<String>) -> Self {
        self.config.public_paths.push(path.into());
        self
    }

    /// Set password hasher parameters.
    #[must_use]
    pub const fn hasher(mut self, hasher: HasherConfig) -> Self {
        self.config.hasher = hasher;
        self
    }

    /// Build the config.
    #[must_use]
    pub fn build(self) -> AuthConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AuthConfig::default();
        assert!(config.jwt_secret.is_none());
        assert_eq!(config.session_minutes, 30);
        assert_eq!(config.session_lifetime(), Duration::from_secs(1800));
        assert_eq!(config.hasher, HasherConfig::default());
    }

    #[test]
    fn test_public_paths() {
        let config = AuthConfig::default();
        assert!(config.is_public_path("/"));
        assert!(config.is_public_path("/login"));
        assert!(config.is_public_path("/register"));
        assert!(config.is_public_path("/static/css/app.css"));
        assert!(config.is_public_path("/openapi.json"));
        assert!(config.is_public_path("/token"));

        // Root is exact, not a prefix for everything
        assert!(!config.is_public_path("/dashboard"));
        assert!(!config.is_public_path("/tasks/1/edit"));
        assert!(!config.is_public_path("/logout"));
        assert!(!config.is_public_path("/api/subjects"));
    }

    #[test]
    fn test_builder() {
        let config = AuthConfig::builder()
            .session_minutes(10)
            .gate_accepts_bearer(true)
            .public_path("/about")
            .hasher(HasherConfig::insecure_fast())
            .build();

        assert_eq!(config.session_minutes, 10);
        assert!(config.gate_accepts_bearer);
        assert!(config.is_public_path("/about"));
        assert_eq!(config.hasher.memory_kib, 1024);
    }

    #[test]
    fn test_session_minutes_bounds() {
        assert!(AuthConfig::builder().session_minutes(0).build().validate().is_err());
        assert!(
            AuthConfig::builder()
                .session_minutes(MAX_SESSION_MINUTES)
                .build()
                .validate()
                .is_ok()
        );

        let huge = AuthConfig::builder().session_minutes(200_000_000_000).build();
        assert!(huge.validate().is_err());

        let overflow = AuthConfig::builder().session_minutes(u64::MAX).build();
        assert_eq!(overflow.session_lifetime(), Duration::MAX);
    }

    #[test]
    fn test_secret_validation() {
        let short = AuthConfig::builder().jwt_secret("abcd").build();
        assert!(short.validate().is_err());

        let not_hex = AuthConfig::builder().jwt_secret("z".repeat(64)).build();
        assert!(not_hex.validate().is_err());

        let good = AuthConfig::builder().jwt_secret("ab".repeat(32)).build();
        assert!(good.validate().is_ok());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = AuthConfig::builder().jwt_secret("ab".repeat(32)).build();
        let debug = format!("{config:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("abab"));
    }
}
