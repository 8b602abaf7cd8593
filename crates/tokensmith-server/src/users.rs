//! In-memory user directory backing every token callback.
//!
//! Each user carries a revocation epoch (`generation`). Tokens are stamped
//! with the epoch current at signing time and only validate while it is
//! unchanged, so [`UserDirectory::revoke`] invalidates every outstanding
//! token of a user at once.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::{DashMap, mapref::entry::Entry};
use serde::Serialize;
use serde_json::{Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokensmith_auth::callbacks::ResponseBody;
use tokensmith_auth::prelude::*;
use uuid::Uuid;

use crate::ServerError;
use crate::config::SeedUser;
use crate::secrets;

/// Claim identifying the user.
pub const USER_ID_CLAIM: &str = "user_id";
/// Claim carrying the revocation epoch.
pub const GENERATION_CLAIM: &str = "gen";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    /// Revocation epoch, bumped by [`UserDirectory::revoke`].
    pub generation: u64,
}

#[derive(Debug)]
struct UserRecord {
    user: User,
    password_hash: String,
    refresh_token_hash: Option<String>,
}

#[derive(Debug, Default)]
struct Inner {
    records: DashMap<Uuid, UserRecord>,
    by_username: DashMap<String, Uuid>,
}

/// Shared handle to the user store. Cloning is cheap.
#[derive(Debug, Clone, Default)]
pub struct UserDirectory {
    inner: Arc<Inner>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a directory holding the configured users.
    pub fn from_seeds(seeds: &[SeedUser]) -> Result<Self, ServerError> {
        let directory = Self::new();
        for seed in seeds {
            directory.add_user(&seed.username, &seed.password)?;
        }
        if directory.is_empty() {
            tracing::warn!("No users configured; every login will fail");
        } else {
            tracing::info!(users = directory.len(), "User directory seeded");
        }
        Ok(directory)
    }

    /// Adds a user, hashing the password.
    ///
    /// # Errors
    ///
    /// `ServerError::DuplicateUser` if the username is taken.
    pub fn add_user(&self, username: &str, password: &str) -> Result<User, ServerError> {
        let password_hash = secrets::hash_password(password)
            .map_err(|e| ServerError::PasswordHash(e.to_string()))?;

        let Entry::Vacant(slot) = self.inner.by_username.entry(username.to_string()) else {
            return Err(ServerError::DuplicateUser(username.to_string()));
        };
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            generation: 0,
        };
        self.inner.records.insert(
            user.id,
            UserRecord {
                user: user.clone(),
                password_hash,
                refresh_token_hash: None,
            },
        );
        slot.insert(user.id);
        tracing::debug!(user_id = %user.id, username, "User added");
        Ok(user)
    }

    pub fn get(&self, id: &Uuid) -> Option<User> {
        self.inner.records.get(id).map(|r| r.user.clone())
    }

    pub fn len(&self) -> usize {
        self.inner.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.records.is_empty()
    }

    /// Invalidates every token and the refresh token of a user.
    ///
    /// Returns `false` if the user does not exist.
    pub fn revoke(&self, id: &Uuid) -> bool {
        let Some(mut record) = self.inner.records.get_mut(id) else {
            return false;
        };
        record.user.generation += 1;
        record.refresh_token_hash = None;
        tracing::info!(user_id = %id, generation = record.user.generation, "Tokens revoked");
        true
    }

    fn password_hash(&self, username: &str) -> Option<(Uuid, String)> {
        let id = *self.inner.by_username.get(username)?;
        let record = self.inner.records.get(&id)?;
        Some((id, record.password_hash.clone()))
    }
}

/// Identifying claims of a user.
pub fn user_claims(user: &User) -> Payload {
    let mut payload = Payload::new();
    payload.insert(USER_ID_CLAIM.to_string(), json!(user.id.to_string()));
    payload
}

/// Stamps issue time, a unique token id and the revocation epoch.
pub fn stamp_claims(user: &User, mut payload: Payload) -> Payload {
    payload.insert(
        "iat".to_string(),
        json!(OffsetDateTime::now_utc().unix_timestamp()),
    );
    payload.insert("jti".to_string(), json!(Uuid::new_v4().to_string()));
    payload.insert(GENERATION_CLAIM.to_string(), json!(user.generation));
    payload
}

#[async_trait]
impl CredentialVerifier<User> for UserDirectory {
    async fn load_user(&self, credentials: &Credentials) -> AuthResult<Option<User>> {
        let username = credentials.require("username")?;
        let password = credentials.require("password")?.to_string();

        let Some((id, hash)) = self.password_hash(username) else {
            tracing::debug!(username, "Unknown username");
            return Ok(None);
        };

        let matches =
            tokio::task::spawn_blocking(move || secrets::verify_password(&password, &hash))
                .await
                .map_err(|e| AuthError::internal(format!("password check aborted: {e}")))?
                .map_err(|e| AuthError::storage(format!("stored password hash unreadable: {e}")))?;

        if !matches {
            tracing::debug!(username, "Password mismatch");
            return Ok(None);
        }
        Ok(self.get(&id))
    }
}

#[async_trait]
impl ClaimsDeserializer<User> for UserDirectory {
    async fn deserialize(&self, payload: &Payload) -> AuthResult<Option<User>> {
        let id = payload
            .get(USER_ID_CLAIM)
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok());
        Ok(id.and_then(|id| self.get(&id)))
    }
}

#[async_trait]
impl TokenValidator<User> for UserDirectory {
    async fn validate(&self, user: &User, payload: &Payload) -> AuthResult<bool> {
        let generation = payload.get(GENERATION_CLAIM).and_then(Value::as_u64);
        let current = generation == Some(user.generation);
        if !current {
            tracing::debug!(
                user_id = %user.id,
                token_generation = ?generation,
                "Token from a revoked generation"
            );
        }
        Ok(current)
    }
}

#[async_trait]
impl RefreshTokenIssuer<User> for UserDirectory {
    async fn issue(&self, user: &User) -> AuthResult<Option<RefreshToken>> {
        let Some(mut record) = self.inner.records.get_mut(&user.id) else {
            return Err(AuthError::storage("user vanished before refresh token issue"));
        };
        let token = secrets::generate_refresh_token();
        record.refresh_token_hash = Some(secrets::hash_refresh_token(&token));
        Ok(Some(RefreshToken::new(token)))
    }
}

#[async_trait]
impl RefreshAuthorizer<User> for UserDirectory {
    async fn authorize_refresh(
        &self,
        user: &User,
        payload: &Payload,
        refresh_token: &RefreshToken,
    ) -> AuthResult<Option<Payload>> {
        let presented = secrets::hash_refresh_token(refresh_token.as_str());
        let stored = self
            .inner
            .records
            .get(&user.id)
            .and_then(|r| r.refresh_token_hash.clone());

        if stored.as_deref() == Some(presented.as_str()) {
            Ok(Some(payload.clone()))
        } else {
            tracing::debug!(user_id = %user.id, "Refresh token mismatch");
            Ok(None)
        }
    }
}

/// Adds `expires_at` (RFC 3339) to login and refresh responses.
#[derive(Debug, Clone, Copy)]
pub struct ExpiresAt {
    expiry: Option<Duration>,
}

impl ExpiresAt {
    pub fn new(expiry: Option<Duration>) -> Self {
        Self { expiry }
    }
}

impl ResponseShaper<User> for ExpiresAt {
    fn shape(&self, _user: &User, mut body: ResponseBody) -> ResponseBody {
        let Some(expiry) = self.expiry else {
            return body;
        };
        let at = OffsetDateTime::now_utc().saturating_add(time::Duration::seconds(
            i64::try_from(expiry.as_secs()).unwrap_or(i64::MAX),
        ));
        if let Ok(formatted) = at.format(&Rfc3339) {
            body.insert("expires_at".to_string(), Value::String(formatted));
        }
        body
    }
}

/// Wires the directory into a callback registry.
pub fn registry(
    directory: &UserDirectory,
    config: &TokenConfig,
) -> Result<CallbackRegistry<User>, ConfigError> {
    let shaper = ExpiresAt::new(config.expiry);
    CallbackRegistry::<User>::builder()
        .user_loader(directory.clone())
        .serializer(user_claims)
        .deserializer(directory.clone())
        .payload_handler(stamp_claims)
        .verifier(directory.clone())
        .refresh_issuer(directory.clone())
        .refresh_handler(directory.clone())
        .auth_response(shaper)
        .refresh_response(shaper)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> (UserDirectory, User) {
        let dir = UserDirectory::new();
        let alice = dir.add_user("alice", "wonderland").unwrap();
        (dir, alice)
    }

    fn creds(username: &str, password: &str) -> Credentials {
        Credentials::new()
            .with("username", username)
            .with("password", password)
    }

    #[test]
    fn test_duplicate_username() {
        let (dir, _) = directory();
        assert!(matches!(
            dir.add_user("alice", "again"),
            Err(ServerError::DuplicateUser(_))
        ));
        assert_eq!(dir.len(), 1);
    }

    #[tokio::test]
    async fn test_load_user() {
        let (dir, alice) = directory();
        assert_eq!(
            dir.load_user(&creds("alice", "wonderland")).await.unwrap(),
            Some(alice)
        );
        assert_eq!(dir.load_user(&creds("alice", "nope")).await.unwrap(), None);
        assert_eq!(dir.load_user(&creds("carol", "x")).await.unwrap(), None);

        let err = dir
            .load_user(&Credentials::new().with("username", "alice"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::MalformedCredentials { .. }));
    }

    #[tokio::test]
    async fn test_claims_roundtrip_through_directory() {
        let (dir, alice) = directory();
        let payload = user_claims(&alice);
        assert_eq!(dir.deserialize(&payload).await.unwrap(), Some(alice));

        let mut unknown = Payload::new();
        unknown.insert(USER_ID_CLAIM.to_string(), json!(Uuid::new_v4().to_string()));
        assert_eq!(dir.deserialize(&unknown).await.unwrap(), None);

        let mut garbage = Payload::new();
        garbage.insert(USER_ID_CLAIM.to_string(), json!(42));
        assert_eq!(dir.deserialize(&garbage).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_revoke_invalidates_generation() {
        let (dir, alice) = directory();
        let payload = stamp_claims(&alice, user_claims(&alice));
        assert!(payload.contains_key("jti"));
        assert!(dir.validate(&alice, &payload).await.unwrap());

        assert!(dir.revoke(&alice.id));
        let current = dir.get(&alice.id).unwrap();
        assert_eq!(current.generation, 1);
        assert!(!dir.validate(&current, &payload).await.unwrap());
        assert!(!dir.revoke(&Uuid::new_v4()));
    }

    #[tokio::test]
    async fn test_refresh_token_rotation() {
        let (dir, alice) = directory();
        let payload = user_claims(&alice);

        let first = dir.issue(&alice).await.unwrap().unwrap();
        let second = dir.issue(&alice).await.unwrap().unwrap();
        assert_ne!(first, second);

        assert!(
            dir.authorize_refresh(&alice, &payload, &first)
                .await
                .unwrap()
                .is_none()
        );
        assert_eq!(
            dir.authorize_refresh(&alice, &payload, &second)
                .await
                .unwrap(),
            Some(payload.clone())
        );

        dir.revoke(&alice.id);
        assert!(
            dir.authorize_refresh(&alice, &payload, &second)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_expires_at_shaper() {
        let (_, alice) = directory();
        let shaped =
            ExpiresAt::new(Some(Duration::from_secs(60))).shape(&alice, ResponseBody::new());
        assert!(shaped.get("expires_at").and_then(Value::as_str).is_some());

        let shaped = ExpiresAt::new(None).shape(&alice, ResponseBody::new());
        assert!(shaped.get("expires_at").is_none());
    }
}
