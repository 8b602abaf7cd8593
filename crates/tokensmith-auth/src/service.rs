//! Token lifecycle orchestration.
//!
//! [`AuthenticationService`] ties the callback registry, the payload builder
//! and the codec together into the three operations hosts care about:
//! issuing a token from credentials, verifying a presented token, and
//! refreshing an expired one.

use std::sync::Arc;

use crate::AuthResult;
use crate::callbacks::{CallbackRegistry, Credentials, RefreshToken};
use crate::config::{ConfigError, TokenConfig};
use crate::identity::{Identity, IdentityContext};
use crate::token::{EXPIRY_CLAIM, JwtSigner, Payload, PayloadBuilder, Signer, TokenCodec};

/// Issues, verifies and refreshes tokens.
///
/// Immutable after construction; share it behind an `Arc`.
pub struct AuthenticationService<U> {
    config: TokenConfig,
    registry: CallbackRegistry<U>,
    builder: PayloadBuilder<U>,
    codec: TokenCodec,
}

impl<U> std::fmt::Debug for AuthenticationService<U> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticationService")
            .field("algorithm", &self.config.algorithm)
            .field("expiry", &self.config.expiry)
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}

impl<U: Clone + Send + Sync + 'static> AuthenticationService<U> {
    /// Creates a service signing with HMAC over the configured secret.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the configuration does not validate.
    pub fn new(config: TokenConfig, registry: CallbackRegistry<U>) -> Result<Self, ConfigError> {
        config.validate()?;
        let signer = JwtSigner::from_config(&config)?;
        tracing::debug!(
            algorithm = %signer.algorithm(),
            expiry = ?config.expiry,
            leeway_secs = config.leeway_secs(),
            "Token service initialized"
        );
        Ok(Self::with_signer(config, registry, Arc::new(signer)))
    }

    /// Creates a service with a custom signer.
    ///
    /// `secret_key` and `algorithm` in `config` are not consulted and the
    /// configuration is not validated.
    #[must_use]
    pub fn with_signer(
        config: TokenConfig,
        registry: CallbackRegistry<U>,
        signer: Arc<dyn Signer>,
    ) -> Self {
        let builder = PayloadBuilder::new(&registry, config.expiry);
        let codec = TokenCodec::new(signer, config.leeway);
        Self {
            config,
            registry,
            builder,
            codec,
        }
    }

    /// Issues a token for the user the credentials identify.
    ///
    /// Settles `ctx` with the outcome. Returns `Ok(None)` when no user
    /// matches.
    ///
    /// # Errors
    ///
    /// Propagates `AuthError::MalformedCredentials` and storage errors from
    /// the credential verifier, and signing failures.
    pub async fn make_token(
        &self,
        ctx: &IdentityContext<U>,
        credentials: &Credentials,
    ) -> AuthResult<Option<String>> {
        let user = self.registry.user_loader.load_user(credentials).await?;
        ctx.settle(Identity::from(user.clone()));

        let Some(user) = user else {
            tracing::debug!("Login rejected: no user for credentials");
            return Ok(None);
        };

        let payload = self.builder.build(&user, None);
        let token = self.codec.encode(&payload)?;
        tracing::info!("Issued token");
        Ok(Some(token))
    }

    /// Verifies a presented token and settles `ctx`.
    ///
    /// Returns the payload when the token is accepted. A token that does not
    /// decode leaves `ctx` untouched; a token whose user is gone or that the
    /// validator rejects settles `ctx` as anonymous.
    ///
    /// # Errors
    ///
    /// Propagates errors from the deserializer and validator.
    pub async fn verify_token(
        &self,
        ctx: &IdentityContext<U>,
        token: &str,
    ) -> AuthResult<Option<Payload>> {
        let Some(payload) = self.codec.decode(token, true) else {
            return Ok(None);
        };

        let identity = self.identify(&payload).await?;
        let accepted = identity.is_authenticated();
        ctx.settle(identity);
        Ok(accepted.then_some(payload))
    }

    /// Verifies a token without touching any request context.
    ///
    /// This is what lazy identity resolution runs.
    ///
    /// # Errors
    ///
    /// Propagates errors from the deserializer and validator.
    pub async fn verify(&self, token: &str) -> AuthResult<(Option<Payload>, Identity<U>)> {
        let Some(payload) = self.codec.decode(token, true) else {
            return Ok((None, Identity::Anonymous));
        };

        match self.identify(&payload).await? {
            Identity::Authenticated(user) => Ok((Some(payload), Identity::Authenticated(user))),
            Identity::Anonymous => Ok((None, Identity::Anonymous)),
        }
    }

    /// Renews a token, possibly expired, using a refresh token.
    ///
    /// The old token's signature is still checked; its expiry is not. The
    /// new token is built from the refresh authorizer's payload with a fresh
    /// `exp` and the payload handler applied again.
    ///
    /// # Errors
    ///
    /// Propagates errors from the deserializer and refresh authorizer, and
    /// signing failures.
    pub async fn refresh_token(
        &self,
        ctx: &IdentityContext<U>,
        token: &str,
        refresh_token: &RefreshToken,
    ) -> AuthResult<Option<String>> {
        let Some(payload) = self.codec.decode(token, false) else {
            tracing::debug!("Refresh rejected: token does not decode");
            return Ok(None);
        };

        let Some(user) = self.registry.deserializer.deserialize(&payload).await? else {
            tracing::debug!("Refresh rejected: user no longer exists");
            ctx.settle(Identity::Anonymous);
            return Ok(None);
        };

        let Some(mut renewed) = self
            .registry
            .refresh_handler
            .authorize_refresh(&user, &payload, refresh_token)
            .await?
        else {
            tracing::debug!("Refresh rejected by authorizer");
            ctx.settle(Identity::Anonymous);
            return Ok(None);
        };

        renewed.remove(EXPIRY_CLAIM);
        let rebuilt = self.builder.build(&user, Some(renewed));
        ctx.settle(Identity::Authenticated(user));

        let token = self.codec.encode(&rebuilt)?;
        tracing::info!("Refreshed token");
        Ok(Some(token))
    }

    /// Issues a refresh token for `user` through the registered issuer.
    ///
    /// # Errors
    ///
    /// Propagates errors from the refresh token issuer.
    pub async fn issue_refresh_token(&self, user: &U) -> AuthResult<Option<RefreshToken>> {
        self.registry.refresh_issuer.issue(user).await
    }

    /// Token configuration.
    #[must_use]
    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    /// Registered callbacks.
    #[must_use]
    pub fn registry(&self) -> &CallbackRegistry<U> {
        &self.registry
    }

    /// Token codec.
    #[must_use]
    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    async fn identify(&self, payload: &Payload) -> AuthResult<Identity<U>> {
        let Some(user) = self.registry.deserializer.deserialize(payload).await? else {
            tracing::debug!("Token rejected: user no longer exists");
            return Ok(Identity::Anonymous);
        };

        if self.registry.verifier.validate(&user, payload).await? {
            Ok(Identity::Authenticated(user))
        } else {
            tracing::debug!("Token rejected by validator");
            Ok(Identity::Anonymous)
        }
    }
}
