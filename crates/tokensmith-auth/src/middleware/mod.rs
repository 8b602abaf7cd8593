//! Axum extractors for bearer authentication.
//!
//! This module provides:
//!
//! - Per-request [`IdentityContext`](crate::IdentityContext) injection
//! - Optional and required identity extractors
//! - JSON error responses for [`AuthError`](crate::AuthError)
//!
//! # Example
//!
//! ```ignore
//! use axum::{Router, routing::get};
//! use tokensmith_auth::{Authenticated, CurrentIdentity, TokenState};
//!
//! async fn greet(CurrentIdentity(user): CurrentIdentity<User>) -> String {
//!     match user {
//!         Some(user) => format!("Hello, {}!", user.name),
//!         None => "Hello, anonymous!".to_string(),
//!     }
//! }
//!
//! async fn protected(Authenticated(user): Authenticated<User>) -> String {
//!     format!("Welcome back, {}", user.name)
//! }
//!
//! let app = Router::new()
//!     .route("/", get(greet))
//!     .route("/protected", get(protected))
//!     .with_state(token_state);
//! ```

pub mod auth;
pub mod error;

pub use auth::{Authenticated, CurrentIdentity, RequestIdentity};
pub use error::error_json;
