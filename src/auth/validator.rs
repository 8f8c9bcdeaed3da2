use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::SessionPayload;
use crate::store::CredentialStore;

/// Verdict returned by a validator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Validation {
    pub valid: bool,
    /// Attached to the request on success. For sessions, `None` means the
    /// decoded payload itself is used.
    pub credentials: Option<Value>,
}

impl Validation {
    pub fn valid(credentials: Value) -> Self {
        Self {
            valid: true,
            credentials: Some(credentials),
        }
    }

    pub fn accepted() -> Self {
        Self {
            valid: true,
            credentials: None,
        }
    }

    pub fn invalid() -> Self {
        Self::default()
    }
}

/// Decides whether a username/password pair from a Basic header is acceptable.
#[async_trait]
pub trait BasicValidator: Send + Sync {
    async fn validate(&self, username: &str, password: &str) -> anyhow::Result<Validation>;
}

/// Re-confirms a decoded session on every request.
#[async_trait]
pub trait SessionValidator: Send + Sync {
    async fn validate(&self, session: &SessionPayload) -> anyhow::Result<Validation>;
}

struct BasicFn<F>(F);

#[async_trait]
impl<F> BasicValidator for BasicFn<F>
where
    F: Fn(&str, &str) -> Validation + Send + Sync,
{
    async fn validate(&self, username: &str, password: &str) -> anyhow::Result<Validation> {
        Ok((self.0)(username, password))
    }
}

struct SessionFn<F>(F);

#[async_trait]
impl<F> SessionValidator for SessionFn<F>
where
    F: Fn(&SessionPayload) -> Validation + Send + Sync,
{
    async fn validate(&self, session: &SessionPayload) -> anyhow::Result<Validation> {
        Ok((self.0)(session))
    }
}

/// Wraps a synchronous closure as a Basic validator.
pub fn basic_validator_fn<F>(f: F) -> Arc<dyn BasicValidator>
where
    F: Fn(&str, &str) -> Validation + Send + Sync + 'static,
{
    Arc::new(BasicFn(f))
}

/// Wraps a synchronous closure as a session validator.
pub fn session_validator_fn<F>(f: F) -> Arc<dyn SessionValidator>
where
    F: Fn(&SessionPayload) -> Validation + Send + Sync + 'static,
{
    Arc::new(SessionFn(f))
}

/// Checks Basic credentials against a [`CredentialStore`]. Attaches the
/// principal's id and display name.
#[derive(Clone)]
pub struct StoreBasicValidator {
    store: Arc<dyn CredentialStore>,
}

impl StoreBasicValidator {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl BasicValidator for StoreBasicValidator {
    async fn validate(&self, username: &str, password: &str) -> anyhow::Result<Validation> {
        match self.store.authenticate(username, password).await? {
            Some(principal) => Ok(Validation::valid(serde_json::to_value(principal.summary())?)),
            None => Ok(Validation::invalid()),
        }
    }
}

/// Accepts a session while its `username` still names a known principal.
#[derive(Clone)]
pub struct StoreSessionValidator {
    store: Arc<dyn CredentialStore>,
}

impl StoreSessionValidator {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SessionValidator for StoreSessionValidator {
    async fn validate(&self, session: &SessionPayload) -> anyhow::Result<Validation> {
        let Some(username) = session.get("username") else {
            return Ok(Validation::invalid());
        };

        match self.store.lookup(username).await? {
            Some(_) => Ok(Validation::accepted()),
            None => Ok(Validation::invalid()),
        }
    }
}
