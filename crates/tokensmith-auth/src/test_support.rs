//! Shared fixtures for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use crate::AuthResult;
use crate::callbacks::{
    CallbackRegistry, ClaimsDeserializer, CredentialVerifier, Credentials, RefreshAuthorizer,
    RefreshToken, RefreshTokenIssuer, TokenValidator,
};
use crate::config::TokenConfig;
use crate::error::AuthError;
use crate::service::AuthenticationService;
use crate::token::Payload;

pub const SECRET: &str = "unit-test-secret";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestUser {
    pub id: String,
    pub name: String,
}

impl TestUser {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
        }
    }
}

pub fn serialize_user(user: &TestUser) -> Payload {
    let mut payload = Payload::new();
    payload.insert("user_id".to_string(), json!(user.id));
    payload
}

/// In-memory user store implementing every async callback.
///
/// Passwords are `"{name}-pw"`, refresh tokens are `"refresh-{id}"`.
#[derive(Clone, Default)]
pub struct TestDirectory {
    users: Arc<HashMap<String, TestUser>>,
    revoked: Arc<Mutex<HashSet<String>>>,
    pub deserialize_calls: Arc<AtomicUsize>,
    pub validate_calls: Arc<AtomicUsize>,
}

impl TestDirectory {
    pub fn revoke(&self, id: &str) {
        self.revoked.lock().unwrap().insert(id.to_string());
    }

    pub fn deserialize_count(&self) -> usize {
        self.deserialize_calls.load(Ordering::SeqCst)
    }

    pub fn validate_count(&self) -> usize {
        self.validate_calls.load(Ordering::SeqCst)
    }
}

pub fn directory() -> TestDirectory {
    let users = [TestUser::new("1", "alice"), TestUser::new("2", "bob")]
        .into_iter()
        .map(|user| (user.id.clone(), user))
        .collect();
    TestDirectory {
        users: Arc::new(users),
        ..TestDirectory::default()
    }
}

#[async_trait]
impl CredentialVerifier<TestUser> for TestDirectory {
    async fn load_user(&self, credentials: &Credentials) -> AuthResult<Option<TestUser>> {
        let username = credentials.require("username")?;
        let password = credentials.require("password")?;
        Ok(self
            .users
            .values()
            .find(|user| user.name == username && password == format!("{}-pw", user.name))
            .cloned())
    }
}

#[async_trait]
impl ClaimsDeserializer<TestUser> for TestDirectory {
    async fn deserialize(&self, payload: &Payload) -> AuthResult<Option<TestUser>> {
        self.deserialize_calls.fetch_add(1, Ordering::SeqCst);
        let Some(id) = payload.get("user_id").and_then(|v| v.as_str()) else {
            return Ok(None);
        };
        if id == "storage-down" {
            return Err(AuthError::storage("user store unavailable"));
        }
        Ok(self.users.get(id).cloned())
    }
}

#[async_trait]
impl TokenValidator<TestUser> for TestDirectory {
    async fn validate(&self, user: &TestUser, _payload: &Payload) -> AuthResult<bool> {
        self.validate_calls.fetch_add(1, Ordering::SeqCst);
        Ok(!self.revoked.lock().unwrap().contains(&user.id))
    }
}

#[async_trait]
impl RefreshAuthorizer<TestUser> for TestDirectory {
    async fn authorize_refresh(
        &self,
        user: &TestUser,
        payload: &Payload,
        refresh_token: &RefreshToken,
    ) -> AuthResult<Option<Payload>> {
        if refresh_token.as_str() == format!("refresh-{}", user.id) {
            Ok(Some(payload.clone()))
        } else {
            Ok(None)
        }
    }
}

#[async_trait]
impl RefreshTokenIssuer<TestUser> for TestDirectory {
    async fn issue(&self, user: &TestUser) -> AuthResult<Option<RefreshToken>> {
        Ok(Some(RefreshToken::new(format!("refresh-{}", user.id))))
    }
}

/// Registry with every slot backed by `dir`.
pub fn full_registry(dir: &TestDirectory) -> CallbackRegistry<TestUser> {
    CallbackRegistry::builder()
        .user_loader(dir.clone())
        .serializer(serialize_user)
        .deserializer(dir.clone())
        .verifier(dir.clone())
        .refresh_handler(dir.clone())
        .refresh_issuer(dir.clone())
        .build()
        .unwrap()
}

pub fn test_config() -> TokenConfig {
    TokenConfig::with_secret(SECRET)
}

pub fn service(config: TokenConfig, dir: &TestDirectory) -> AuthenticationService<TestUser> {
    AuthenticationService::new(config, full_registry(dir)).unwrap()
}

pub fn alice_credentials() -> Credentials {
    Credentials::new()
        .with("username", "alice")
        .with("password", "alice-pw")
}
