//! Login endpoint handler.
//!
//! ```ignore
//! POST /auth
//! Content-Type: application/x-www-form-urlencoded
//!
//! username=alice&password=wonderland
//! ```
//!
//! Responds with `{"token": "...", "refresh_token": "..."}`; the refresh
//! token is present only when refresh is enabled and the issuer returns one.

use axum::{
    Form, Json,
    extract::{State, rejection::FormRejection},
};
use serde_json::Value;
use tracing::{debug, warn};

use crate::callbacks::{Credentials, ResponseBody};
use crate::error::AuthError;
use crate::http::TokenState;
use crate::identity::{Identity, IdentityContext};

/// Exchanges submitted credentials for a token.
///
/// The login runs in its own identity context, so a bearer token sent along
/// with the credentials plays no part.
///
/// # Errors
///
/// - 400 when the body is not a form or required fields are missing
/// - 403 when the credentials identify no user
pub async fn authorize_handler<U>(
    State(state): State<TokenState<U>>,
    form: Result<Form<Credentials>, FormRejection>,
) -> Result<Json<ResponseBody>, AuthError>
where
    U: Clone + Send + Sync + 'static,
{
    let Form(credentials) = form.map_err(|e| {
        debug!(error = %e, "Unreadable login body");
        AuthError::malformed_credentials(e.body_text())
    })?;

    let service = &state.service;
    let ctx = IdentityContext::<U>::new(None);

    let token = match service.make_token(&ctx, &credentials).await {
        Ok(Some(token)) => token,
        Ok(None) => return Err(AuthError::AuthenticationFailed),
        Err(e) => {
            warn!(error = %e, category = %e.category(), "Login failed");
            return Err(e);
        }
    };

    let Some(Identity::Authenticated(user)) = ctx.peek() else {
        return Err(AuthError::internal("login produced a token without a user"));
    };

    let mut body = ResponseBody::new();
    body.insert("token".to_string(), Value::String(token));

    if service.config().enable_refresh
        && let Some(refresh_token) = service.issue_refresh_token(user).await?
    {
        body.insert(
            "refresh_token".to_string(),
            Value::String(refresh_token.into_inner()),
        );
    }

    Ok(Json(service.registry().shape_auth_response(user, body)))
}
