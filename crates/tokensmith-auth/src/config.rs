//! Token lifecycle configuration.
//!
//! [`TokenConfig`] carries everything the library needs to know at startup:
//! token lifetime and leeway, the signing secret and algorithm, and which
//! HTTP operations to mount where.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default token lifetime (10 hours).
pub const DEFAULT_EXPIRY: Duration = Duration::from_secs(10 * 60 * 60);

/// Largest clock-skew tolerance [`TokenConfig::validate`] accepts (24 hours).
pub const MAX_LEEWAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Signing algorithms accepted by [`TokenConfig::validate`].
pub const SUPPORTED_ALGORITHMS: [&str; 3] = ["HS256", "HS384", "HS512"];

/// Token lifecycle configuration.
///
/// # Example (TOML)
///
/// ```toml
/// [tokens]
/// secret_key = "change-me"
/// expiry = "30m"
/// leeway = "5s"
/// url_prefix = "/api"
/// ```
///
/// Setting `expiry = "none"` issues tokens without an `exp` claim.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Token lifetime. `None` disables the `exp` claim entirely.
    #[serde(with = "optional_expiry")]
    pub expiry: Option<Duration>,

    /// Clock-skew tolerance applied when checking `exp`.
    /// Only whole seconds are honoured.
    #[serde(with = "leeway_duration")]
    pub leeway: Duration,

    /// Mount the login operation.
    pub enable_authorize: bool,

    /// Mount the refresh operation and hand out refresh tokens on login.
    pub enable_refresh: bool,

    /// Path of the login operation.
    pub authorize_endpoint: String,

    /// Path of the refresh operation.
    pub refresh_endpoint: String,

    /// Optional prefix prepended to both endpoints.
    pub url_prefix: Option<String>,

    /// Secret used to sign and verify tokens. Mandatory.
    #[serde(skip_serializing)]
    pub secret_key: Option<String>,

    /// Mount any routes at all. When disabled the host drives the
    /// [`AuthenticationService`](crate::AuthenticationService) itself.
    pub enable_routes: bool,

    /// HMAC signing algorithm (`HS256`, `HS384` or `HS512`).
    pub algorithm: String,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            expiry: Some(DEFAULT_EXPIRY),
            leeway: Duration::ZERO,
            enable_authorize: true,
            enable_refresh: true,
            authorize_endpoint: "/auth".to_string(),
            refresh_endpoint: "/auth/refresh".to_string(),
            url_prefix: None,
            secret_key: None,
            enable_routes: true,
            algorithm: "HS256".to_string(),
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),

    /// A mandatory callback was not registered.
    #[error("Missing required callback: {0}")]
    MissingCallback(&'static str),
}

impl TokenConfig {
    /// Creates a default configuration with the given signing secret.
    #[must_use]
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            secret_key: Some(secret.into()),
            ..Self::default()
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if no secret key is set, and
    /// `ConfigError::InvalidValue` if:
    /// - The secret key is empty
    /// - An endpoint or the URL prefix does not start with `/`
    /// - The signing algorithm is not supported
    /// - The leeway exceeds [`MAX_LEEWAY`]
    /// - The expiry is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.secret_key.as_deref() {
            None => return Err(ConfigError::Missing("secret_key".to_string())),
            Some("") => {
                return Err(ConfigError::InvalidValue(
                    "secret_key cannot be empty".to_string(),
                ));
            }
            Some(_) => {}
        }

        for (name, value) in [
            ("authorize_endpoint", &self.authorize_endpoint),
            ("refresh_endpoint", &self.refresh_endpoint),
        ] {
            if !value.starts_with('/') {
                return Err(ConfigError::InvalidValue(format!(
                    "{} must start with '/': '{}'",
                    name, value
                )));
            }
        }

        if let Some(prefix) = &self.url_prefix
            && !prefix.starts_with('/')
        {
            return Err(ConfigError::InvalidValue(format!(
                "url_prefix must start with '/': '{}'",
                prefix
            )));
        }

        if !SUPPORTED_ALGORITHMS.contains(&self.algorithm.as_str()) {
            return Err(ConfigError::InvalidValue(format!(
                "Invalid signing algorithm: '{}'. Must be HS256, HS384, or HS512",
                self.algorithm
            )));
        }

        if self.leeway > MAX_LEEWAY {
            return Err(ConfigError::InvalidValue(format!(
                "leeway must be at most {}: '{}'",
                humantime::format_duration(MAX_LEEWAY),
                humantime::format_duration(self.leeway)
            )));
        }

        if self.expiry == Some(Duration::ZERO) {
            return Err(ConfigError::InvalidValue(
                "expiry must be > 0 (use \"none\" to disable expiry)".to_string(),
            ));
        }

        Ok(())
    }

    /// Full path of the login operation, prefix included.
    #[must_use]
    pub fn authorize_path(&self) -> String {
        self.prefixed(&self.authorize_endpoint)
    }

    /// Full path of the refresh operation, prefix included.
    #[must_use]
    pub fn refresh_path(&self) -> String {
        self.prefixed(&self.refresh_endpoint)
    }

    /// Leeway in whole seconds, as applied to the `exp` check.
    #[must_use]
    pub fn leeway_secs(&self) -> u64 {
        self.leeway.as_secs()
    }

    fn prefixed(&self, endpoint: &str) -> String {
        match self.url_prefix.as_deref() {
            Some(prefix) => format!("{}{}", prefix.trim_end_matches('/'), endpoint),
            None => endpoint.to_string(),
        }
    }
}

/// Serde support for an expiry that may be switched off.
///
/// Accepts a humantime string (`"10h"`), a number of seconds (bare or
/// quoted), or one of `"none"`, `"off"`, `""` and `null` to disable expiry.
mod optional_expiry {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;
    use std::time::Duration;

    pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(duration) => {
                serializer.serialize_str(&humantime::format_duration(*duration).to_string())
            }
            None => serializer.serialize_str("none"),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(ExpiryVisitor)
    }

    struct ExpiryVisitor;

    impl<'de> Visitor<'de> for ExpiryVisitor {
        type Value = Option<Duration>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a duration such as \"10h\", a number of seconds, or \"none\"")
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
            let trimmed = value.trim();
            if trimmed.is_empty()
                || trimmed.eq_ignore_ascii_case("none")
                || trimmed.eq_ignore_ascii_case("off")
            {
                return Ok(None);
            }
            if let Ok(secs) = trimmed.parse::<u64>() {
                return Ok(Some(Duration::from_secs(secs)));
            }
            humantime::parse_duration(trimmed)
                .map(Some)
                .map_err(|e| E::custom(format!("invalid expiry '{}': {}", trimmed, e)))
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
            Ok(Some(Duration::from_secs(value)))
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
            u64::try_from(value)
                .map(|secs| Some(Duration::from_secs(secs)))
                .map_err(|_| E::custom("expiry cannot be negative"))
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
        where
            D: Deserializer<'de>,
        {
            deserializer.deserialize_any(self)
        }
    }
}

/// Serde support for the leeway: a humantime string or a number of seconds,
/// bare or quoted.
mod leeway_duration {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;
    use std::time::Duration;

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(LeewayVisitor)
    }

    struct LeewayVisitor;

    impl<'de> Visitor<'de> for LeewayVisitor {
        type Value = Duration;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a duration such as \"5s\" or a number of seconds")
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
            let trimmed = value.trim();
            if let Ok(secs) = trimmed.parse::<u64>() {
                return Ok(Duration::from_secs(secs));
            }
            humantime::parse_duration(trimmed)
                .map_err(|e| E::custom(format!("invalid leeway '{}': {}", trimmed, e)))
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
            Ok(Duration::from_secs(value))
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
            u64::try_from(value)
                .map(Duration::from_secs)
                .map_err(|_| E::custom("leeway cannot be negative"))
        }
    }
}
