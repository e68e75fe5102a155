//! # Tasknest Server
//!
//! axum HTTP server for Tasknest: the authentication core, page and JSON
//! handlers, and embedded static assets.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Embedded static files.
pub mod assets;
/// Authentication and authorization.
pub mod auth;
/// HTTP handlers.
pub mod handlers;
mod server;
/// HTML pages.
pub mod views;

pub use auth::{AuthError, AuthState, CurrentUser, PublicUser, User, UserStore};
pub use server::{AppState, Server, ServerBuilder, build_router};

use tasknest_core::{Config, StoreError};

/// Start the server and run until Ctrl-C.
///
/// # Errors
///
/// Returns error if the server fails to start.
pub async fn start(config: Config) -> Result<(), ServerError> {
    let server = Server::new(config)?;
    server.run().await
}

/// Server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Server error.
    #[error("Server error: {0}")]
    Server(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Storage error.
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}
