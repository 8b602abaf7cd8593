//! Refresh endpoint handler.
//!
//! ```ignore
//! POST /auth/refresh
//! Content-Type: application/x-www-form-urlencoded
//!
//! token=<expired token>&refresh_token=<refresh token>
//! ```
//!
//! Responds with `{"token": "..."}`.

use axum::{
    Form, Json,
    extract::{State, rejection::FormRejection},
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::callbacks::{RefreshToken, ResponseBody};
use crate::error::AuthError;
use crate::http::TokenState;
use crate::identity::{Identity, IdentityContext};

/// Form body of a refresh request.
#[derive(Debug, Default, Deserialize)]
pub struct RefreshRequest {
    /// The token to renew. May be expired.
    pub token: Option<String>,
    /// The refresh token handed out at login.
    pub refresh_token: Option<RefreshToken>,
}

impl RefreshRequest {
    /// Returns both fields, or the error naming the first missing one.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MalformedRefreshRequest` if either field is
    /// absent or empty.
    pub fn into_parts(self) -> Result<(String, RefreshToken), AuthError> {
        let token = self
            .token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::malformed_refresh_request("missing field: token"))?;
        let refresh_token = self
            .refresh_token
            .filter(|t| !t.as_str().is_empty())
            .ok_or_else(|| AuthError::malformed_refresh_request("missing field: refresh_token"))?;
        Ok((token, refresh_token))
    }
}

/// Renews a token using a refresh token.
///
/// # Errors
///
/// - 400 when `token` or `refresh_token` is missing
/// - 403 when the refresh is denied
pub async fn refresh_handler<U>(
    State(state): State<TokenState<U>>,
    form: Result<Form<RefreshRequest>, FormRejection>,
) -> Result<Json<ResponseBody>, AuthError>
where
    U: Clone + Send + Sync + 'static,
{
    let Form(request) = form.map_err(|e| {
        debug!(error = %e, "Unreadable refresh body");
        AuthError::malformed_refresh_request(e.body_text())
    })?;
    let (token, refresh_token) = request.into_parts()?;

    let service = &state.service;
    let ctx = IdentityContext::<U>::new(None);

    let new_token = match service.refresh_token(&ctx, &token, &refresh_token).await {
        Ok(Some(token)) => token,
        Ok(None) => return Err(AuthError::RefreshDenied),
        Err(e) => {
            warn!(error = %e, category = %e.category(), "Refresh failed");
            return Err(e);
        }
    };

    let Some(Identity::Authenticated(user)) = ctx.peek() else {
        return Err(AuthError::internal("refresh produced a token without a user"));
    };

    let mut body = ResponseBody::new();
    body.insert("token".to_string(), Value::String(new_token));

    Ok(Json(service.registry().shape_refresh_response(user, body)))
}
