//! Per-request identity.
//!
//! Each request gets its own [`IdentityContext`]. It starts unresolved and
//! moves exactly once to a terminal [`Identity`], either lazily on first read
//! ([`IdentityContext::resolve`]) or eagerly when the service settles it
//! during login, verification or refresh. The terminal value is then reused
//! for the rest of the request.

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use tokio::sync::OnceCell;

use crate::service::AuthenticationService;

/// Prefix of the `Authorization` header value carrying a token.
pub const BEARER_PREFIX: &str = "Bearer ";

/// Terminal identity of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity<U> {
    /// A token or credentials established this user.
    Authenticated(U),
    /// Identification was attempted and failed, or nothing was presented.
    Anonymous,
}

impl<U> Identity<U> {
    /// Returns the user, if authenticated.
    #[must_use]
    pub fn user(&self) -> Option<&U> {
        match self {
            Self::Authenticated(user) => Some(user),
            Self::Anonymous => None,
        }
    }

    /// Consumes the identity, returning the user if authenticated.
    #[must_use]
    pub fn into_user(self) -> Option<U> {
        match self {
            Self::Authenticated(user) => Some(user),
            Self::Anonymous => None,
        }
    }

    /// Returns `true` for [`Identity::Authenticated`].
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

impl<U> From<Option<U>> for Identity<U> {
    fn from(user: Option<U>) -> Self {
        user.map_or(Self::Anonymous, Self::Authenticated)
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
///
/// Any other shape, including an empty token, yields `None`.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.strip_prefix(BEARER_PREFIX))
        .filter(|token| !token.is_empty())
}

/// Request-scoped identity, resolved at most once.
#[derive(Debug)]
pub struct IdentityContext<U> {
    bearer: Option<String>,
    state: OnceCell<Identity<U>>,
}

impl<U> IdentityContext<U> {
    /// Creates an unresolved context for a request that presented `bearer`.
    #[must_use]
    pub fn new(bearer: Option<String>) -> Self {
        Self {
            bearer,
            state: OnceCell::new(),
        }
    }

    /// Creates an unresolved context from the request headers.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self::new(bearer_token(headers).map(ToString::to_string))
    }

    /// The bearer token captured when the context was created.
    #[must_use]
    pub fn bearer(&self) -> Option<&str> {
        self.bearer.as_deref()
    }

    /// Records the terminal identity.
    ///
    /// Returns `false` if the context was already resolved (or is being
    /// resolved concurrently); the earlier value is kept.
    pub fn settle(&self, identity: Identity<U>) -> bool {
        self.state.set(identity).is_ok()
    }

    /// Returns the terminal identity without resolving.
    #[must_use]
    pub fn peek(&self) -> Option<&Identity<U>> {
        self.state.get()
    }

    /// Returns `true` once a terminal identity is recorded.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.state.initialized()
    }
}

impl<U: Clone + Send + Sync + 'static> IdentityContext<U> {
    /// Resolves the identity, verifying the bearer token on first call.
    ///
    /// Without a bearer token the context becomes anonymous without
    /// consulting the service. Concurrent first calls share one evaluation.
    /// A callback failure is logged and treated as anonymous.
    pub async fn resolve(&self, service: &AuthenticationService<U>) -> &Identity<U> {
        self.state
            .get_or_init(|| async {
                let Some(token) = self.bearer.as_deref() else {
                    return Identity::Anonymous;
                };
                match service.verify(token).await {
                    Ok((_, identity)) => identity,
                    Err(e) => {
                        tracing::warn!(
                            error = %e,
                            category = %e.category(),
                            "Identity resolution failed, treating request as anonymous"
                        );
                        Identity::Anonymous
                    }
                }
            })
            .await
    }

    /// Resolves the identity and returns the user, if any.
    pub async fn user(&self, service: &AuthenticationService<U>) -> Option<&U> {
        self.resolve(service).await.user()
    }
}
