use std::sync::Arc;

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use base64::engine::general_purpose;
use base64::Engine as _;
use serde_json::{json, Value};

use super::validator::BasicValidator;
use crate::errors::AuthError;

pub const DEFAULT_REALM: &str = "Authentication";

/// Username/password pair pulled out of an `Authorization: Basic` header.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Parses `Basic base64(user:pass)`. The scheme token is case-insensitive and
/// an empty username is rejected.
pub fn parse_authorization(headers: &HeaderMap) -> Result<BasicCredentials, AuthError> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(AuthError::MalformedHeader)?;

    let (scheme, encoded) = header.trim().split_once(' ').ok_or(AuthError::MalformedHeader)?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return Err(AuthError::MalformedHeader);
    }

    let decoded = general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|_| AuthError::MalformedHeader)?;
    let decoded = String::from_utf8(decoded).map_err(|_| AuthError::MalformedHeader)?;

    let (username, password) = decoded.split_once(':').ok_or(AuthError::MalformedHeader)?;
    if username.is_empty() {
        return Err(AuthError::MalformedHeader);
    }

    Ok(BasicCredentials {
        username: username.to_string(),
        password: password.to_string(),
    })
}

/// Builds the header value a client would send. Handy for tests and tooling.
pub fn encode_authorization(username: &str, password: &str) -> String {
    format!(
        "Basic {}",
        general_purpose::STANDARD.encode(format!("{username}:{password}"))
    )
}

/// Stateless scheme: every request carries and re-proves its credentials.
#[derive(Clone)]
pub struct BasicScheme {
    realm: String,
    validator: Arc<dyn BasicValidator>,
}

impl BasicScheme {
    pub fn new(validator: Arc<dyn BasicValidator>) -> Self {
        Self {
            realm: DEFAULT_REALM.to_string(),
            validator,
        }
    }

    pub fn with_realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = realm.into();
        self
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    /// `WWW-Authenticate` value sent with a denial.
    pub fn challenge(&self) -> String {
        format!("Basic realm=\"{}\"", self.realm)
    }

    pub fn extract(&self, headers: &HeaderMap) -> Result<BasicCredentials, AuthError> {
        parse_authorization(headers)
    }

    pub async fn enforce(&self, credentials: &BasicCredentials) -> Result<Value, AuthError> {
        let validation = self
            .validator
            .validate(&credentials.username, &credentials.password)
            .await
            .map_err(|err| AuthError::ValidatorFailed(err.to_string()))?;

        if !validation.valid {
            return Err(AuthError::ValidatorRejected);
        }

        Ok(validation
            .credentials
            .unwrap_or_else(|| json!({ "username": credentials.username })))
    }
}
