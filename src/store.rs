//! Credential store: known principals keyed by username.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::utils::{hash_password, verify_against_dummy, verify_password};

/// A known identity. Only the argon2 hash of the secret is kept.
#[derive(Debug, Clone)]
pub struct Principal {
    pub username: String,
    pub password_hash: String,
    pub id: i64,
    pub display_name: String,
}

impl Principal {
    pub fn new(
        username: impl Into<String>,
        password: &str,
        id: i64,
        display_name: impl Into<String>,
    ) -> Result<Self, AppError> {
        Ok(Self {
            username: username.into(),
            password_hash: hash_password(password)?,
            id,
            display_name: display_name.into(),
        })
    }

    pub fn verify(&self, password: &str) -> bool {
        verify_password(password, &self.password_hash).unwrap_or(false)
    }

    pub fn summary(&self) -> PrincipalSummary {
        PrincipalSummary {
            id: self.id,
            name: self.display_name.clone(),
        }
    }
}

/// What gets attached to a request after a successful credential check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalSummary {
    pub id: i64,
    pub name: String,
}

/// On-disk form of a principal. Exactly one of `password` or `password_hash`.
#[derive(Debug, Deserialize)]
pub struct PrincipalEntry {
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub password_hash: Option<String>,
    pub id: i64,
    pub name: String,
}

impl TryFrom<PrincipalEntry> for Principal {
    type Error = AppError;

    fn try_from(value: PrincipalEntry) -> Result<Self, Self::Error> {
        let password_hash = match (value.password, value.password_hash) {
            (Some(password), None) => hash_password(&password)?,
            (None, Some(hash)) => hash,
            _ => {
                return Err(AppError::configuration(format!(
                    "principal {} needs exactly one of password or password_hash",
                    value.username
                )))
            }
        };

        Ok(Principal {
            username: value.username,
            password_hash,
            id: value.id,
            display_name: value.name,
        })
    }
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// `Ok(None)` means the username is unknown. Callers must treat that as
    /// invalid credentials rather than an error.
    async fn lookup(&self, username: &str) -> anyhow::Result<Option<Principal>>;

    /// Looks the user up and checks the password. Unknown usernames still pay
    /// for a hash verification.
    async fn authenticate(&self, username: &str, password: &str) -> anyhow::Result<Option<Principal>> {
        match self.lookup(username).await? {
            Some(principal) if principal.verify(password) => Ok(Some(principal)),
            Some(_) => Ok(None),
            None => {
                verify_against_dummy(password);
                Ok(None)
            }
        }
    }
}

/// Read-only map built at startup.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCredentialStore {
    principals: HashMap<String, Principal>,
}

impl InMemoryCredentialStore {
    /// Fails on a repeated username; it is the principal's key.
    pub fn new(principals: impl IntoIterator<Item = Principal>) -> Result<Self, AppError> {
        let mut map = HashMap::new();
        for principal in principals {
            if map.contains_key(&principal.username) {
                return Err(AppError::configuration(format!(
                    "duplicate principal {}",
                    principal.username
                )));
            }
            map.insert(principal.username.clone(), principal);
        }
        Ok(Self { principals: map })
    }

    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        let entries: Vec<PrincipalEntry> =
            serde_json::from_str(raw).context("failed to parse principals")?;

        let principals = entries
            .into_iter()
            .map(Principal::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::new(principals)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read principals file {}", path.display()))?;
        Self::from_json(&raw)
    }

    pub fn len(&self) -> usize {
        self.principals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.principals.is_empty()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn lookup(&self, username: &str) -> anyhow::Result<Option<Principal>> {
        Ok(self.principals.get(username).cloned())
    }
}
