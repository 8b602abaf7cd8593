//! # tokensmith-auth
//!
//! Signed bearer token lifecycle management for axum applications.
//!
//! This crate provides:
//! - Token issuing from host-validated credentials
//! - Token verification with expiry and clock-skew leeway
//! - Refresh of expired tokens through a separate refresh secret
//! - Request-scoped identity resolution, evaluated at most once per request
//!
//! ## Overview
//!
//! The crate never decides how credentials are checked or where users live.
//! The host application plugs that in through the traits in [`callbacks`],
//! registered once at startup into a frozen [`CallbackRegistry`]. The
//! [`AuthenticationService`] then turns an established identity into a signed
//! token and back.
//!
//! ## Modules
//!
//! - [`config`] - Token lifetime, leeway, signing and routing configuration
//! - [`callbacks`] - Host-supplied strategies and their registry
//! - [`token`] - Payload construction, signing and the token codec
//! - [`service`] - Login, verification and refresh orchestration
//! - [`identity`] - Per-request identity context
//! - [`middleware`] - Axum extractors for bearer authentication
//! - [`http`] - Axum handlers and router for the login/refresh operations
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tokensmith_auth::{AuthenticationService, CallbackRegistry, TokenConfig, TokenState};
//!
//! let registry = CallbackRegistry::builder()
//!     .user_loader(directory.clone())
//!     .serializer(|user: &User| claims_for(user))
//!     .deserializer(directory.clone())
//!     .build()?;
//!
//! let service = AuthenticationService::new(config.clone(), registry)?;
//! let state = TokenState::new(Arc::new(service));
//! let app = tokensmith_auth::http::routes(state, &config);
//! ```

pub mod callbacks;
pub mod config;
pub mod error;
pub mod http;
pub mod identity;
pub mod middleware;
pub mod service;
pub mod token;

#[cfg(test)]
pub(crate) mod test_support;

pub use callbacks::{
    CallbackRegistry, CallbackRegistryBuilder, ClaimsDeserializer, ClaimsSerializer, Credentials,
    CredentialVerifier, PayloadPostprocessor, RefreshAuthorizer, RefreshToken, RefreshTokenIssuer,
    ResponseShaper, TokenValidator,
};
pub use config::{ConfigError, TokenConfig};
pub use error::{AuthError, ErrorCategory};
pub use http::TokenState;
pub use identity::{Identity, IdentityContext};
pub use middleware::{Authenticated, CurrentIdentity, RequestIdentity};
pub use service::AuthenticationService;
pub use token::{Payload, PayloadBuilder, TokenCodec};

/// Type alias for authentication results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use tokensmith_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::callbacks::{
        CallbackRegistry, ClaimsDeserializer, ClaimsSerializer, Credentials, CredentialVerifier,
        PayloadPostprocessor, RefreshAuthorizer, RefreshToken, RefreshTokenIssuer, ResponseShaper,
        TokenValidator,
    };
    pub use crate::config::{ConfigError, TokenConfig};
    pub use crate::error::{AuthError, ErrorCategory};
    pub use crate::http::TokenState;
    pub use crate::identity::{Identity, IdentityContext};
    pub use crate::middleware::{Authenticated, CurrentIdentity, RequestIdentity};
    pub use crate::service::AuthenticationService;
    pub use crate::token::Payload;
}
