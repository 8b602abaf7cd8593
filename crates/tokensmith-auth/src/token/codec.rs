//! Token encoding and decoding.

use std::sync::Arc;
use std::time::Duration;

use crate::AuthResult;
use crate::config::MAX_LEEWAY;
use crate::error::AuthError;
use crate::token::{Payload, Signer, VerifyRules};

/// Turns payloads into tokens and back.
///
/// Decoding never reports why a token was refused; every failure becomes
/// `None` and the reason is logged at `debug`.
#[derive(Clone)]
pub struct TokenCodec {
    signer: Arc<dyn Signer>,
    leeway: u64,
}

impl TokenCodec {
    /// Creates a codec. Sub-second parts of `leeway` are ignored and it is
    /// capped at [`MAX_LEEWAY`].
    #[must_use]
    pub fn new(signer: Arc<dyn Signer>, leeway: Duration) -> Self {
        if leeway > MAX_LEEWAY {
            tracing::warn!(
                requested_secs = leeway.as_secs(),
                max_secs = MAX_LEEWAY.as_secs(),
                "Leeway capped"
            );
        }
        Self {
            signer,
            leeway: leeway.min(MAX_LEEWAY).as_secs(),
        }
    }

    /// Signs a payload.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Internal` if signing fails.
    pub fn encode(&self, payload: &Payload) -> AuthResult<String> {
        self.signer.sign(payload).map_err(|e| {
            tracing::error!(error = %e, "Failed to sign token");
            AuthError::internal(e.to_string())
        })
    }

    /// Verifies a token and returns its payload.
    ///
    /// With `verify_expiration` the `exp` claim is checked against the
    /// configured leeway; without it only the signature and structure are.
    pub fn decode(&self, token: &str, verify_expiration: bool) -> Option<Payload> {
        let rules = VerifyRules {
            validate_exp: verify_expiration,
            leeway: self.leeway,
        };
        match self.signer.verify(token, &rules) {
            Ok(payload) => Some(payload),
            Err(e) => {
                tracing::debug!(error = %e, verify_expiration, "Token rejected");
                None
            }
        }
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("leeway", &self.leeway)
            .finish_non_exhaustive()
    }
}
