//! Token signing and signature verification.
//!
//! [`Signer`] is the only cryptographic capability the rest of the crate
//! depends on. [`JwtSigner`] implements it with HMAC over a shared secret.
//!
//! ## Supported Algorithms
//!
//! - **HS256**: HMAC with SHA-256 (default)
//! - **HS384**: HMAC with SHA-384
//! - **HS512**: HMAC with SHA-512

use std::fmt;
use std::str::FromStr;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

use crate::config::{ConfigError, TokenConfig};
use crate::token::Payload;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while signing or verifying a token.
#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    /// Failed to encode a token.
    #[error("Failed to encode token: {message}")]
    Encoding {
        /// Description of the encoding error.
        message: String,
    },

    /// Failed to decode a token.
    #[error("Failed to decode token: {message}")]
    Decoding {
        /// Description of the decoding error.
        message: String,
    },

    /// The token has expired beyond the allowed leeway.
    #[error("Token expired")]
    Expired,

    /// The token signature is invalid.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Invalid key data.
    #[error("Invalid key: {message}")]
    InvalidKey {
        /// Description of why the key is invalid.
        message: String,
    },
}

impl SignerError {
    /// Creates a new `Encoding` error.
    #[must_use]
    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding {
            message: message.into(),
        }
    }

    /// Creates a new `Decoding` error.
    #[must_use]
    pub fn decoding(message: impl Into<String>) -> Self {
        Self::Decoding {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidKey` error.
    #[must_use]
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for SignerError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            ErrorKind::InvalidKeyFormat => Self::invalid_key(err.to_string()),
            _ => Self::decoding(err.to_string()),
        }
    }
}

// ============================================================================
// Signing Algorithm
// ============================================================================

/// Supported HMAC signing algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SigningAlgorithm {
    /// HMAC with SHA-256.
    #[default]
    HS256,
    /// HMAC with SHA-384.
    HS384,
    /// HMAC with SHA-512.
    HS512,
}

impl SigningAlgorithm {
    /// Converts to the `jsonwebtoken` Algorithm type.
    #[must_use]
    pub fn to_jwt_algorithm(self) -> Algorithm {
        match self {
            Self::HS256 => Algorithm::HS256,
            Self::HS384 => Algorithm::HS384,
            Self::HS512 => Algorithm::HS512,
        }
    }

    /// Returns the algorithm name as used in JWT headers.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HS256 => "HS256",
            Self::HS384 => "HS384",
            Self::HS512 => "HS512",
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SigningAlgorithm {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HS256" => Ok(Self::HS256),
            "HS384" => Ok(Self::HS384),
            "HS512" => Ok(Self::HS512),
            other => Err(ConfigError::InvalidValue(format!(
                "Invalid signing algorithm: '{}'. Must be HS256, HS384, or HS512",
                other
            ))),
        }
    }
}

// ============================================================================
// Signer
// ============================================================================

/// Rules applied while verifying a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyRules {
    /// Reject tokens whose `exp` lies further in the past than `leeway`.
    pub validate_exp: bool,
    /// Clock-skew tolerance in seconds.
    pub leeway: u64,
}

/// Signs payloads and verifies signed tokens.
pub trait Signer: Send + Sync {
    /// Signs `payload`, returning a compact token.
    ///
    /// # Errors
    ///
    /// Returns `SignerError::Encoding` if the payload cannot be signed.
    fn sign(&self, payload: &Payload) -> Result<String, SignerError>;

    /// Verifies `token` and returns its payload.
    ///
    /// Tokens without `exp` pass even when `rules.validate_exp` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the structure, algorithm, signature or expiry is
    /// not acceptable.
    fn verify(&self, token: &str, rules: &VerifyRules) -> Result<Payload, SignerError>;
}

/// HMAC signer backed by `jsonwebtoken`.
#[derive(Clone)]
pub struct JwtSigner {
    algorithm: SigningAlgorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtSigner {
    /// Creates a signer for the given shared secret.
    #[must_use]
    pub fn new(secret: &[u8], algorithm: SigningAlgorithm) -> Self {
        Self {
            algorithm,
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    /// Creates a signer from the secret and algorithm in `config`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` without a secret key, and
    /// `ConfigError::InvalidValue` for an empty secret or an unsupported
    /// algorithm.
    pub fn from_config(config: &TokenConfig) -> Result<Self, ConfigError> {
        let secret = config
            .secret_key
            .as_deref()
            .ok_or_else(|| ConfigError::Missing("secret_key".to_string()))?;
        if secret.is_empty() {
            return Err(ConfigError::InvalidValue(
                "secret_key cannot be empty".to_string(),
            ));
        }
        let algorithm = config.algorithm.parse()?;
        Ok(Self::new(secret.as_bytes(), algorithm))
    }

    /// Returns the signing algorithm.
    #[must_use]
    pub fn algorithm(&self) -> SigningAlgorithm {
        self.algorithm
    }

    fn validation(&self, rules: &VerifyRules) -> Validation {
        let mut validation = Validation::new(self.algorithm.to_jwt_algorithm());
        validation.required_spec_claims.clear();
        validation.validate_exp = rules.validate_exp;
        validation.validate_aud = false;
        validation.leeway = rules.leeway;
        validation
    }
}

impl fmt::Debug for JwtSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtSigner")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl Signer for JwtSigner {
    fn sign(&self, payload: &Payload) -> Result<String, SignerError> {
        let header = Header::new(self.algorithm.to_jwt_algorithm());
        encode(&header, payload, &self.encoding_key)
            .map_err(|e| SignerError::encoding(e.to_string()))
    }

    fn verify(&self, token: &str, rules: &VerifyRules) -> Result<Payload, SignerError> {
        let data = decode::<Payload>(token, &self.decoding_key, &self.validation(rules))?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::OffsetDateTime;

    const STRICT: VerifyRules = VerifyRules {
        validate_exp: true,
        leeway: 0,
    };

    fn claims(exp: Option<i64>) -> Payload {
        let mut payload = Payload::new();
        payload.insert("user_id".to_string(), json!("42"));
        if let Some(exp) = exp {
            payload.insert("exp".to_string(), json!(exp));
        }
        payload
    }

    fn now() -> i64 {
        OffsetDateTime::now_utc().unix_timestamp()
    }

    #[test]
    fn test_sign_verify_each_algorithm() {
        for alg in [
            SigningAlgorithm::HS256,
            SigningAlgorithm::HS384,
            SigningAlgorithm::HS512,
        ] {
            let signer = JwtSigner::new(b"secret", alg);
            let token = signer.sign(&claims(Some(now() + 60))).unwrap();
            assert_eq!(token.split('.').count(), 3);
            let payload = signer.verify(&token, &STRICT).unwrap();
            assert_eq!(payload["user_id"], json!("42"));
        }
    }

    #[test]
    fn test_wrong_secret_is_invalid_signature() {
        let token = JwtSigner::new(b"secret", SigningAlgorithm::HS256)
            .sign(&claims(None))
            .unwrap();
        let err = JwtSigner::new(b"other", SigningAlgorithm::HS256)
            .verify(&token, &STRICT)
            .unwrap_err();
        assert!(matches!(err, SignerError::InvalidSignature));
    }

    #[test]
    fn test_algorithm_mismatch_is_rejected() {
        let token = JwtSigner::new(b"secret", SigningAlgorithm::HS512)
            .sign(&claims(None))
            .unwrap();
        assert!(
            JwtSigner::new(b"secret", SigningAlgorithm::HS256)
                .verify(&token, &STRICT)
                .is_err()
        );
    }

    #[test]
    fn test_expired_token() {
        let signer = JwtSigner::new(b"secret", SigningAlgorithm::HS256);
        let token = signer.sign(&claims(Some(now() - 120))).unwrap();

        let err = signer.verify(&token, &STRICT).unwrap_err();
        assert!(matches!(err, SignerError::Expired));

        let relaxed = VerifyRules {
            validate_exp: false,
            leeway: 0,
        };
        assert!(signer.verify(&token, &relaxed).is_ok());
    }

    #[test]
    fn test_missing_exp_passes() {
        let signer = JwtSigner::new(b"secret", SigningAlgorithm::HS256);
        let token = signer.sign(&claims(None)).unwrap();
        assert!(signer.verify(&token, &STRICT).is_ok());
    }

    #[test]
    fn test_garbage_is_decoding_error() {
        let signer = JwtSigner::new(b"secret", SigningAlgorithm::HS256);
        let err = signer.verify("not-a-token", &STRICT).unwrap_err();
        assert!(matches!(err, SignerError::Decoding { .. }));
    }

    #[test]
    fn test_from_config() {
        let mut config = TokenConfig::with_secret("s3cret");
        config.algorithm = "HS384".to_string();
        let signer = JwtSigner::from_config(&config).unwrap();
        assert_eq!(signer.algorithm(), SigningAlgorithm::HS384);

        config.algorithm = "none".to_string();
        assert!(JwtSigner::from_config(&config).is_err());

        assert!(matches!(
            JwtSigner::from_config(&TokenConfig::default()),
            Err(ConfigError::Missing(_))
        ));
    }

    #[test]
    fn test_algorithm_display() {
        assert_eq!(SigningAlgorithm::HS256.to_string(), "HS256");
        assert_eq!(
            "HS512".parse::<SigningAlgorithm>().unwrap(),
            SigningAlgorithm::HS512
        );
    }
}
