//! Token payload construction.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use time::OffsetDateTime;

use crate::callbacks::{CallbackRegistry, ClaimsSerializer, PayloadPostprocessor};

/// Claims carried by a token.
pub type Payload = serde_json::Map<String, Value>;

/// Reserved claim holding the expiry as a Unix timestamp in seconds.
pub const EXPIRY_CLAIM: &str = "exp";

/// Builds the payload for a user.
///
/// Order of precedence, lowest first: the base payload, the serializer's
/// claims, the generated `exp`, the payload handler.
pub struct PayloadBuilder<U> {
    serializer: Arc<dyn ClaimsSerializer<U>>,
    payload_handler: Arc<dyn PayloadPostprocessor<U>>,
    expiry: Option<Duration>,
}

impl<U> Clone for PayloadBuilder<U> {
    fn clone(&self) -> Self {
        Self {
            serializer: Arc::clone(&self.serializer),
            payload_handler: Arc::clone(&self.payload_handler),
            expiry: self.expiry,
        }
    }
}

impl<U> PayloadBuilder<U> {
    /// Creates a builder from the registry's serializer and payload handler.
    ///
    /// `expiry` of `None` produces payloads without `exp`.
    #[must_use]
    pub fn new(registry: &CallbackRegistry<U>, expiry: Option<Duration>) -> Self {
        Self {
            serializer: Arc::clone(&registry.serializer),
            payload_handler: Arc::clone(&registry.payload_handler),
            expiry,
        }
    }

    /// Builds the payload for `user`, starting from `base` if given.
    ///
    /// An `exp` already present in `base` is kept.
    pub fn build(&self, user: &U, base: Option<Payload>) -> Payload {
        let mut payload = base.unwrap_or_default();
        payload.extend(self.serializer.serialize(user));

        if let Some(expiry) = self.expiry
            && !payload.contains_key(EXPIRY_CLAIM)
        {
            payload.insert(EXPIRY_CLAIM.to_string(), Value::from(expires_at(expiry)));
        }

        self.payload_handler.process(user, payload)
    }
}

fn expires_at(expiry: Duration) -> i64 {
    let lifetime = i64::try_from(expiry.as_secs()).unwrap_or(i64::MAX);
    OffsetDateTime::now_utc()
        .unix_timestamp()
        .saturating_add(lifetime)
}
