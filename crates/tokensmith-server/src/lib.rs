//! Demo host application for `tokensmith-auth`.
//!
//! Keeps users in memory, signs tokens with the configured secret and
//! exposes a couple of routes that read the request identity.

pub mod config;
pub mod handlers;
pub mod observability;
pub mod secrets;
pub mod server;
pub mod users;

pub use config::AppConfig;
pub use server::{AppState, ServerBuilder, TokensmithServer, build_app, build_router, build_state};

use tokensmith_auth::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("token configuration error: {0}")]
    Token(#[from] ConfigError),

    #[error("duplicate user: {0}")]
    DuplicateUser(String),

    #[error("password hashing failed: {0}")]
    PasswordHash(String),
}
