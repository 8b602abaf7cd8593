//! HTTP handlers for the login and refresh operations.
//!
//! # Available Handlers
//!
//! - [`authorize`] - Exchange credentials for a token
//! - [`refresh`] - Renew an expired token with a refresh token
//!
//! [`routes`] mounts both according to [`TokenConfig`].

pub mod authorize;
pub mod refresh;

use std::sync::Arc;

use axum::{Router, routing::post};

use crate::config::TokenConfig;
use crate::service::AuthenticationService;

pub use authorize::authorize_handler;
pub use refresh::{RefreshRequest, refresh_handler};

/// State shared by the handlers and extractors of this crate.
///
/// Hosts with their own state expose it through `FromRef`:
///
/// ```ignore
/// impl FromRef<AppState> for TokenState<User> {
///     fn from_ref(state: &AppState) -> Self {
///         state.tokens.clone()
///     }
/// }
/// ```
pub struct TokenState<U> {
    /// Token service used by every operation.
    pub service: Arc<AuthenticationService<U>>,
}

impl<U> TokenState<U> {
    /// Creates the state from a shared service.
    pub fn new(service: Arc<AuthenticationService<U>>) -> Self {
        Self { service }
    }
}

impl<U> Clone for TokenState<U> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
        }
    }
}

/// Builds a router with the enabled token operations.
///
/// Mounts nothing when `enable_routes` is off. Paths include `url_prefix`.
pub fn routes<U>(state: TokenState<U>, config: &TokenConfig) -> Router
where
    U: Clone + Send + Sync + 'static,
{
    let mut router = Router::<TokenState<U>>::new();

    if config.enable_routes {
        if config.enable_authorize {
            let path = config.authorize_path();
            tracing::debug!(path = %path, "Mounting login route");
            router = router.route(&path, post(authorize_handler::<U>));
        }
        if config.enable_refresh {
            let path = config.refresh_path();
            tracing::debug!(path = %path, "Mounting refresh route");
            router = router.route(&path, post(refresh_handler::<U>));
        }
    }

    router.with_state(state)
}
