use axum::{Json, extract::State, http::StatusCode};
use serde_json::{Value, json};
use tokensmith_auth::{AuthError, Authenticated, CurrentIdentity};

use crate::users::{User, UserDirectory};

pub async fn root(CurrentIdentity(user): CurrentIdentity<User>) -> String {
    match user {
        Some(user) => format!("Hi, {}!", user.username),
        None => "Hi, anonymous!".to_string(),
    }
}

pub async fn protected(Authenticated(user): Authenticated<User>) -> Json<Value> {
    Json(json!({
        "id": user.id,
        "username": user.username,
    }))
}

/// Invalidates every token of the caller, including the one used here.
pub async fn revoke(
    State(users): State<UserDirectory>,
    Authenticated(user): Authenticated<User>,
) -> Result<StatusCode, AuthError> {
    if users.revoke(&user.id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AuthError::AuthenticationFailed)
    }
}

pub async fn healthz() -> Json<Value> {
    Json(json!({"status": "ok"}))
}
