//! Host-supplied callbacks and their registry.
//!
//! The library never decides how credentials are checked, what goes into a
//! token, or whether an expired token may be renewed. Each of those decisions
//! is a trait in this module. The host registers one implementation per
//! responsibility through [`CallbackRegistry::builder`]; optional slots fall
//! back to the explicit default strategies defined here.
//!
//! | Slot | Trait | Default |
//! |---|---|---|
//! | `user_loader` | [`CredentialVerifier`] | mandatory |
//! | `serializer` | [`ClaimsSerializer`] | mandatory |
//! | `deserializer` | [`ClaimsDeserializer`] | mandatory |
//! | `payload_handler` | [`PayloadPostprocessor`] | [`UnchangedPayload`] |
//! | `verifier` | [`TokenValidator`] | [`AcceptAll`] |
//! | `refresh_handler` | [`RefreshAuthorizer`] | [`DenyRefresh`] |
//! | `refresh_issuer` | [`RefreshTokenIssuer`] | [`NoRefreshTokens`] |
//! | `auth_response` | [`ResponseShaper`] | [`UnchangedResponse`] |
//! | `refresh_response` | [`ResponseShaper`] | [`UnchangedResponse`] |

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::AuthResult;
use crate::config::ConfigError;
use crate::error::AuthError;
use crate::token::Payload;

/// JSON object returned by the login and refresh operations.
pub type ResponseBody = serde_json::Map<String, serde_json::Value>;

// ============================================================================
// Request data
// ============================================================================

/// Fields submitted to the login operation.
///
/// The library treats credentials as an opaque bag of strings; only the
/// [`CredentialVerifier`] knows which fields it needs.
#[derive(Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct Credentials(HashMap<String, String>);

impl Credentials {
    /// Creates an empty set of credentials.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field, replacing any previous value.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Returns the value of a field, if present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Returns the value of a field that must be present and non-empty.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MalformedCredentials` naming the field otherwise.
    pub fn require(&self, name: &str) -> AuthResult<&str> {
        match self.get(name) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(AuthError::malformed_credentials(format!(
                "missing field: {}",
                name
            ))),
        }
    }
}

impl<K, V> FromIterator<(K, V)> for Credentials
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

// Values are never printed; passwords travel in here.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut fields: Vec<&str> = self.0.keys().map(String::as_str).collect();
        fields.sort_unstable();
        f.debug_struct("Credentials").field("fields", &fields).finish()
    }
}

/// Long-lived secondary secret that authorizes renewing an expired token.
///
/// Independent of the token itself; its format is up to the host.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RefreshToken(String);

impl RefreshToken {
    /// Wraps a refresh token value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the raw value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the wrapper, returning the raw value.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl From<String> for RefreshToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Debug for RefreshToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RefreshToken([REDACTED])")
    }
}

// ============================================================================
// Callback traits
// ============================================================================

/// Resolves submitted credentials to a user.
#[async_trait]
pub trait CredentialVerifier<U>: Send + Sync {
    /// Returns the user the credentials belong to, or `None` if they are
    /// wrong.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MalformedCredentials` when required fields are
    /// absent, or a storage error if the user store is unavailable.
    async fn load_user(&self, credentials: &Credentials) -> AuthResult<Option<U>>;
}

/// Turns a user into the claims identifying them.
pub trait ClaimsSerializer<U>: Send + Sync {
    /// Produces the identifying claims for `user`.
    fn serialize(&self, user: &U) -> Payload;
}

impl<U, F> ClaimsSerializer<U> for F
where
    F: Fn(&U) -> Payload + Send + Sync,
{
    fn serialize(&self, user: &U) -> Payload {
        self(user)
    }
}

/// Turns verified claims back into a user.
#[async_trait]
pub trait ClaimsDeserializer<U>: Send + Sync {
    /// Looks up the user identified by `payload`. `None` if the user no
    /// longer exists.
    async fn deserialize(&self, payload: &Payload) -> AuthResult<Option<U>>;
}

/// Final adjustment of a payload before it is signed.
pub trait PayloadPostprocessor<U>: Send + Sync {
    /// Returns the payload to sign.
    fn process(&self, user: &U, payload: Payload) -> Payload;
}

impl<U, F> PayloadPostprocessor<U> for F
where
    F: Fn(&U, Payload) -> Payload + Send + Sync,
{
    fn process(&self, user: &U, payload: Payload) -> Payload {
        self(user, payload)
    }
}

/// Extra acceptance check run after a token decodes successfully.
///
/// This is where hosts implement revocation.
#[async_trait]
pub trait TokenValidator<U>: Send + Sync {
    /// Returns `true` if the token may be used for `user`.
    async fn validate(&self, user: &U, payload: &Payload) -> AuthResult<bool>;
}

/// Decides whether an expired token may be renewed.
#[async_trait]
pub trait RefreshAuthorizer<U>: Send + Sync {
    /// Returns the payload to base the new token on, or `None` to deny.
    ///
    /// `payload` comes from a token whose signature has been verified but
    /// whose expiry has not.
    async fn authorize_refresh(
        &self,
        user: &U,
        payload: &Payload,
        refresh_token: &RefreshToken,
    ) -> AuthResult<Option<Payload>>;
}

/// Issues the refresh token handed out next to a fresh login token.
#[async_trait]
pub trait RefreshTokenIssuer<U>: Send + Sync {
    /// Returns a new refresh token for `user`, or `None` to issue nothing.
    async fn issue(&self, user: &U) -> AuthResult<Option<RefreshToken>>;
}

/// Adjusts the JSON body of a successful login or refresh response.
pub trait ResponseShaper<U>: Send + Sync {
    /// Returns the body to send.
    fn shape(&self, user: &U, body: ResponseBody) -> ResponseBody;
}

impl<U, F> ResponseShaper<U> for F
where
    F: Fn(&U, ResponseBody) -> ResponseBody + Send + Sync,
{
    fn shape(&self, user: &U, body: ResponseBody) -> ResponseBody {
        self(user, body)
    }
}

// ============================================================================
// Default strategies
// ============================================================================

/// Leaves the payload untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnchangedPayload;

impl<U> PayloadPostprocessor<U> for UnchangedPayload {
    fn process(&self, _user: &U, payload: Payload) -> Payload {
        payload
    }
}

/// Accepts every token that decodes.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

#[async_trait]
impl<U: Sync> TokenValidator<U> for AcceptAll {
    async fn validate(&self, _user: &U, _payload: &Payload) -> AuthResult<bool> {
        Ok(true)
    }
}

/// Refuses every refresh request.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyRefresh;

#[async_trait]
impl<U: Sync> RefreshAuthorizer<U> for DenyRefresh {
    async fn authorize_refresh(
        &self,
        _user: &U,
        _payload: &Payload,
        _refresh_token: &RefreshToken,
    ) -> AuthResult<Option<Payload>> {
        Ok(None)
    }
}

/// Never issues refresh tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRefreshTokens;

#[async_trait]
impl<U: Sync> RefreshTokenIssuer<U> for NoRefreshTokens {
    async fn issue(&self, _user: &U) -> AuthResult<Option<RefreshToken>> {
        Ok(None)
    }
}

/// Leaves the response body untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnchangedResponse;

impl<U> ResponseShaper<U> for UnchangedResponse {
    fn shape(&self, _user: &U, body: ResponseBody) -> ResponseBody {
        body
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Frozen set of callbacks, built once at startup.
///
/// Cloning is cheap; every slot is reference counted.
pub struct CallbackRegistry<U> {
    pub(crate) user_loader: Arc<dyn CredentialVerifier<U>>,
    pub(crate) serializer: Arc<dyn ClaimsSerializer<U>>,
    pub(crate) deserializer: Arc<dyn ClaimsDeserializer<U>>,
    pub(crate) payload_handler: Arc<dyn PayloadPostprocessor<U>>,
    pub(crate) verifier: Arc<dyn TokenValidator<U>>,
    pub(crate) refresh_handler: Arc<dyn RefreshAuthorizer<U>>,
    pub(crate) refresh_issuer: Arc<dyn RefreshTokenIssuer<U>>,
    pub(crate) auth_response: Arc<dyn ResponseShaper<U>>,
    pub(crate) refresh_response: Arc<dyn ResponseShaper<U>>,
}

impl<U> Clone for CallbackRegistry<U> {
    fn clone(&self) -> Self {
        Self {
            user_loader: Arc::clone(&self.user_loader),
            serializer: Arc::clone(&self.serializer),
            deserializer: Arc::clone(&self.deserializer),
            payload_handler: Arc::clone(&self.payload_handler),
            verifier: Arc::clone(&self.verifier),
            refresh_handler: Arc::clone(&self.refresh_handler),
            refresh_issuer: Arc::clone(&self.refresh_issuer),
            auth_response: Arc::clone(&self.auth_response),
            refresh_response: Arc::clone(&self.refresh_response),
        }
    }
}

impl<U> fmt::Debug for CallbackRegistry<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackRegistry").finish_non_exhaustive()
    }
}

impl<U: Sync + 'static> CallbackRegistry<U> {
    /// Starts building a registry.
    #[must_use]
    pub fn builder() -> CallbackRegistryBuilder<U> {
        CallbackRegistryBuilder::new()
    }

    /// Shapes a login response body.
    pub fn shape_auth_response(&self, user: &U, body: ResponseBody) -> ResponseBody {
        self.auth_response.shape(user, body)
    }

    /// Shapes a refresh response body.
    pub fn shape_refresh_response(&self, user: &U, body: ResponseBody) -> ResponseBody {
        self.refresh_response.shape(user, body)
    }
}

/// Builder for [`CallbackRegistry`].
pub struct CallbackRegistryBuilder<U> {
    user_loader: Option<Arc<dyn CredentialVerifier<U>>>,
    serializer: Option<Arc<dyn ClaimsSerializer<U>>>,
    deserializer: Option<Arc<dyn ClaimsDeserializer<U>>>,
    payload_handler: Option<Arc<dyn PayloadPostprocessor<U>>>,
    verifier: Option<Arc<dyn TokenValidator<U>>>,
    refresh_handler: Option<Arc<dyn RefreshAuthorizer<U>>>,
    refresh_issuer: Option<Arc<dyn RefreshTokenIssuer<U>>>,
    auth_response: Option<Arc<dyn ResponseShaper<U>>>,
    refresh_response: Option<Arc<dyn ResponseShaper<U>>>,
}

impl<U: Sync + 'static> Default for CallbackRegistryBuilder<U> {
    fn default() -> Self {
        Self::new()
    }
}

impl<U: Sync + 'static> CallbackRegistryBuilder<U> {
    /// Creates a builder with every slot empty.
    #[must_use]
    pub fn new() -> Self {
        Self {
            user_loader: None,
            serializer: None,
            deserializer: None,
            payload_handler: None,
            verifier: None,
            refresh_handler: None,
            refresh_issuer: None,
            auth_response: None,
            refresh_response: None,
        }
    }

    /// Registers the credential verifier (mandatory).
    #[must_use]
    pub fn user_loader(mut self, loader: impl CredentialVerifier<U> + 'static) -> Self {
        self.user_loader = Some(Arc::new(loader));
        self
    }

    /// Registers the claims serializer (mandatory).
    #[must_use]
    pub fn serializer(mut self, serializer: impl ClaimsSerializer<U> + 'static) -> Self {
        self.serializer = Some(Arc::new(serializer));
        self
    }

    /// Registers the claims deserializer (mandatory).
    #[must_use]
    pub fn deserializer(mut self, deserializer: impl ClaimsDeserializer<U> + 'static) -> Self {
        self.deserializer = Some(Arc::new(deserializer));
        self
    }

    /// Registers the payload postprocessor.
    #[must_use]
    pub fn payload_handler(mut self, handler: impl PayloadPostprocessor<U> + 'static) -> Self {
        self.payload_handler = Some(Arc::new(handler));
        self
    }

    /// Registers the token validator.
    #[must_use]
    pub fn verifier(mut self, verifier: impl TokenValidator<U> + 'static) -> Self {
        self.verifier = Some(Arc::new(verifier));
        self
    }

    /// Registers the refresh authorizer.
    #[must_use]
    pub fn refresh_handler(mut self, handler: impl RefreshAuthorizer<U> + 'static) -> Self {
        self.refresh_handler = Some(Arc::new(handler));
        self
    }

    /// Registers the refresh token issuer.
    #[must_use]
    pub fn refresh_issuer(mut self, issuer: impl RefreshTokenIssuer<U> + 'static) -> Self {
        self.refresh_issuer = Some(Arc::new(issuer));
        self
    }

    /// Registers the login response shaper.
    #[must_use]
    pub fn auth_response(mut self, shaper: impl ResponseShaper<U> + 'static) -> Self {
        self.auth_response = Some(Arc::new(shaper));
        self
    }

    /// Registers the refresh response shaper.
    #[must_use]
    pub fn refresh_response(mut self, shaper: impl ResponseShaper<U> + 'static) -> Self {
        self.refresh_response = Some(Arc::new(shaper));
        self
    }

    /// Freezes the registry.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingCallback` naming the first mandatory slot
    /// that was not registered.
    pub fn build(self) -> Result<CallbackRegistry<U>, ConfigError> {
        let user_loader = self
            .user_loader
            .ok_or(ConfigError::MissingCallback("user_loader"))?;
        let serializer = self
            .serializer
            .ok_or(ConfigError::MissingCallback("serializer"))?;
        let deserializer = self
            .deserializer
            .ok_or(ConfigError::MissingCallback("deserializer"))?;

        if self.refresh_handler.is_some() != self.refresh_issuer.is_some() {
            tracing::warn!(
                refresh_handler = self.refresh_handler.is_some(),
                refresh_issuer = self.refresh_issuer.is_some(),
                "Only one of refresh_handler/refresh_issuer is registered; refresh cannot succeed"
            );
        }

        Ok(CallbackRegistry {
            user_loader,
            serializer,
            deserializer,
            payload_handler: self
                .payload_handler
                .unwrap_or_else(|| Arc::new(UnchangedPayload)),
            verifier: self.verifier.unwrap_or_else(|| Arc::new(AcceptAll)),
            refresh_handler: self
                .refresh_handler
                .unwrap_or_else(|| Arc::new(DenyRefresh)),
            refresh_issuer: self
                .refresh_issuer
                .unwrap_or_else(|| Arc::new(NoRefreshTokens)),
            auth_response: self
                .auth_response
                .unwrap_or_else(|| Arc::new(UnchangedResponse)),
            refresh_response: self
                .refresh_response
                .unwrap_or_else(|| Arc::new(UnchangedResponse)),
        })
    }
}
