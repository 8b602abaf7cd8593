//! Bearer identity extractors.
//!
//! Every extractor here shares one [`IdentityContext`] per request. The
//! first extractor to run creates it from the `Authorization` header and
//! stores it in the request extensions; later extractors of the same request
//! reuse it, so the token is verified at most once.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};

use crate::error::AuthError;
use crate::http::TokenState;
use crate::identity::IdentityContext;

/// Returns the request's identity context, creating it on first use.
pub(crate) fn identity_context<U>(parts: &mut Parts) -> Arc<IdentityContext<U>>
where
    U: Send + Sync + 'static,
{
    if let Some(ctx) = parts.extensions.get::<Arc<IdentityContext<U>>>() {
        return Arc::clone(ctx);
    }

    let ctx = Arc::new(IdentityContext::from_headers(&parts.headers));
    parts.extensions.insert(Arc::clone(&ctx));
    ctx
}

// =============================================================================
// Request Identity Extractor
// =============================================================================

/// Raw access to the per-request identity context.
///
/// Never rejects and never resolves the identity by itself.
pub struct RequestIdentity<U>(pub Arc<IdentityContext<U>>);

impl<S, U> FromRequestParts<S> for RequestIdentity<U>
where
    S: Send + Sync,
    U: Send + Sync + 'static,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(identity_context(parts)))
    }
}

// =============================================================================
// Current Identity Extractor
// =============================================================================

/// The request's user, if a valid bearer token was presented.
///
/// # Example
///
/// ```ignore
/// async fn handler(CurrentIdentity(user): CurrentIdentity<User>) -> String {
///     user.map_or_else(|| "anonymous".to_string(), |u| u.name)
/// }
/// ```
pub struct CurrentIdentity<U>(pub Option<U>);

impl<S, U> FromRequestParts<S> for CurrentIdentity<U>
where
    S: Send + Sync,
    U: Clone + Send + Sync + 'static,
    TokenState<U>: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let tokens = TokenState::<U>::from_ref(state);
        let ctx = identity_context::<U>(parts);
        let user = ctx.user(&tokens.service).await.cloned();
        Ok(Self(user))
    }
}

// =============================================================================
// Authenticated Extractor
// =============================================================================

/// The request's user; rejects with 403 when there is none.
///
/// # Example
///
/// ```ignore
/// async fn handler(Authenticated(user): Authenticated<User>) -> String {
///     format!("Hello, {}!", user.name)
/// }
/// ```
pub struct Authenticated<U>(pub U);

impl<S, U> FromRequestParts<S> for Authenticated<U>
where
    S: Send + Sync,
    U: Clone + Send + Sync + 'static,
    TokenState<U>: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let tokens = TokenState::<U>::from_ref(state);
        let ctx = identity_context::<U>(parts);

        match ctx.user(&tokens.service).await {
            Some(user) => Ok(Self(user.clone())),
            None => {
                tracing::debug!(
                    has_bearer = ctx.bearer().is_some(),
                    "Rejecting unauthenticated request"
                );
                Err(AuthError::AuthenticationFailed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{TestUser, alice_credentials, directory, service, test_config};
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Request, StatusCode, header::AUTHORIZATION},
        routing::get,
    };
    use tower::ServiceExt;

    async fn greet(CurrentIdentity(user): CurrentIdentity<TestUser>) -> String {
        user.map_or_else(|| "anonymous".to_string(), |u| u.name)
    }

    async fn protected(Authenticated(user): Authenticated<TestUser>) -> String {
        format!("hello {}", user.name)
    }

    async fn twice(
        CurrentIdentity(first): CurrentIdentity<TestUser>,
        RequestIdentity(ctx): RequestIdentity<TestUser>,
        Authenticated(second): Authenticated<TestUser>,
    ) -> String {
        assert!(ctx.is_resolved());
        assert_eq!(first.as_ref(), Some(&second));
        second.name
    }

    async fn app() -> (Router, String, crate::test_support::TestDirectory) {
        let dir = directory();
        let service = Arc::new(service(test_config(), &dir));
        let token = service
            .make_token(&IdentityContext::new(None), &alice_credentials())
            .await
            .unwrap()
            .unwrap();
        let router = Router::new()
            .route("/", get(greet))
            .route("/protected", get(protected))
            .route("/twice", get(twice))
            .with_state(TokenState::new(service));
        (router, token, dir)
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_current_identity_anonymous() {
        let (app, _, _) = app().await;
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "anonymous");
    }

    #[tokio::test]
    async fn test_current_identity_with_token() {
        let (app, token, _) = app().await;
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(AUTHORIZATION, format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(body_text(response).await, "alice");
    }

    #[tokio::test]
    async fn test_authenticated_without_header_is_forbidden() {
        let (app, _, _) = app().await;
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/protected")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_authenticated_with_bad_token_is_forbidden() {
        let (app, _, _) = app().await;
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/protected")
                    .header(AUTHORIZATION, "Bearer not.a.token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_extractors_share_one_resolution() {
        let (app, token, dir) = app().await;
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/twice")
                    .header(AUTHORIZATION, format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "alice");
        assert_eq!(dir.deserialize_count(), 1);
        assert_eq!(dir.validate_count(), 1);
    }
}
