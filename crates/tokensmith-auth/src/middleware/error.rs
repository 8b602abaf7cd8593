//! Error response handling.
//!
//! This module implements `IntoResponse` for `AuthError`. Bodies are JSON
//! objects of the form `{"error": <code>, "error_description": <message>}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::error::AuthError;

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, description) = error_details(&self);

        if self.is_server_error() {
            tracing::error!(
                error = %self,
                category = %self.category(),
                "Token operation failed"
            );
        } else if self.is_denial() {
            tracing::debug!(code = self.error_code(), "Identity denied");
        }

        (status, Json(error_json(self.error_code(), &description))).into_response()
    }
}

/// Extracts the HTTP status and client-facing description of an error.
///
/// Server errors never expose their internal message.
fn error_details(error: &AuthError) -> (StatusCode, String) {
    match error {
        AuthError::MalformedCredentials { message } => (StatusCode::BAD_REQUEST, message.clone()),
        AuthError::AuthenticationFailed => (
            StatusCode::FORBIDDEN,
            "Authentication failed".to_string(),
        ),
        AuthError::MalformedRefreshRequest { message } => {
            (StatusCode::BAD_REQUEST, message.clone())
        }
        AuthError::RefreshDenied => (StatusCode::FORBIDDEN, "Refresh denied".to_string()),
        AuthError::Configuration { .. }
        | AuthError::Storage { .. }
        | AuthError::Internal { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error".to_string(),
        ),
    }
}

/// Builds the JSON error body.
#[must_use]
pub fn error_json(code: &str, description: &str) -> serde_json::Value {
    json!({
        "error": code,
        "error_description": description,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_malformed_credentials_response() {
        let response = AuthError::malformed_credentials("missing field: password").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = body_json(response).await;
        assert_eq!(json["error"], "malformed_credentials");
        assert_eq!(json["error_description"], "missing field: password");
    }

    #[tokio::test]
    async fn test_denials_are_forbidden() {
        let response = AuthError::AuthenticationFailed.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = AuthError::RefreshDenied.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(response).await["error"], "refresh_denied");
    }

    #[tokio::test]
    async fn test_malformed_refresh_request_response() {
        let response = AuthError::malformed_refresh_request("missing field: token").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_server_error_hides_message() {
        let response = AuthError::storage("connection refused to 10.0.0.5").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(response).await;
        assert_eq!(json["error"], "server_error");
        assert_eq!(json["error_description"], "Internal server error");
    }

    #[test]
    fn test_error_json() {
        let json = error_json("refresh_denied", "Refresh denied");
        assert_eq!(json["error"], "refresh_denied");
        assert_eq!(json["error_description"], "Refresh denied");
    }
}
