//! Token lifecycle error types.
//!
//! Every failure a login, verification or refresh can produce is an
//! [`AuthError`]. Startup problems are [`crate::config::ConfigError`]s and
//! convert into [`AuthError::Configuration`] when they have to cross a
//! request boundary.

use std::fmt;

use crate::config::ConfigError;

/// Errors that can occur while issuing, verifying or refreshing tokens.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Required login fields are absent from the submitted credentials.
    #[error("Malformed credentials: {message}")]
    MalformedCredentials {
        /// Which field is missing or unusable.
        message: String,
    },

    /// No identity could be established.
    ///
    /// Covers unknown users, bad passwords, undecodable tokens and validator
    /// rejections alike; callers never learn which one applied.
    #[error("Authentication failed")]
    AuthenticationFailed,

    /// The refresh request is missing the token or the refresh token.
    #[error("Malformed refresh request: {message}")]
    MalformedRefreshRequest {
        /// Which field is missing.
        message: String,
    },

    /// The refresh authorizer declined to issue a new token.
    #[error("Refresh denied")]
    RefreshDenied,

    /// The token configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// A host callback failed to reach its backing store.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage error.
        message: String,
    },

    /// An unexpected internal error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `MalformedCredentials` error.
    #[must_use]
    pub fn malformed_credentials(message: impl Into<String>) -> Self {
        Self::MalformedCredentials {
            message: message.into(),
        }
    }

    /// Creates a new `MalformedRefreshRequest` error.
    #[must_use]
    pub fn malformed_refresh_request(message: impl Into<String>) -> Self {
        Self::MalformedRefreshRequest {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a client error (4xx category).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedCredentials { .. }
                | Self::AuthenticationFailed
                | Self::MalformedRefreshRequest { .. }
                | Self::RefreshDenied
        )
    }

    /// Returns `true` if this is a server error (5xx category).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Configuration { .. } | Self::Storage { .. } | Self::Internal { .. }
        )
    }

    /// Returns `true` if the request was well-formed but no identity could be
    /// granted.
    #[must_use]
    pub fn is_denial(&self) -> bool {
        matches!(self, Self::AuthenticationFailed | Self::RefreshDenied)
    }

    /// Returns the error category for logging purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MalformedCredentials { .. } => ErrorCategory::Validation,
            Self::AuthenticationFailed => ErrorCategory::Authentication,
            Self::MalformedRefreshRequest { .. } => ErrorCategory::Validation,
            Self::RefreshDenied => ErrorCategory::Refresh,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Storage { .. } => ErrorCategory::Infrastructure,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Returns the machine-readable error code used in response bodies.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MalformedCredentials { .. } => "malformed_credentials",
            Self::AuthenticationFailed => "authentication_failed",
            Self::MalformedRefreshRequest { .. } => "malformed_refresh_request",
            Self::RefreshDenied => "refresh_denied",
            Self::Configuration { .. } => "server_error",
            Self::Storage { .. } => "server_error",
            Self::Internal { .. } => "server_error",
        }
    }
}

impl From<ConfigError> for AuthError {
    fn from(err: ConfigError) -> Self {
        Self::configuration(err.to_string())
    }
}

/// Categories of token errors for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Identity could not be established.
    Authentication,
    /// Refresh authorization was refused.
    Refresh,
    /// Request validation errors.
    Validation,
    /// Infrastructure/storage errors.
    Infrastructure,
    /// Configuration errors.
    Configuration,
    /// Internal server errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::Refresh => write!(f, "refresh"),
            Self::Validation => write!(f, "validation"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Configuration => write!(f, "configuration"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
