use axum::http::HeaderMap;
use serde_json::Value;

use super::basic::{BasicCredentials, BasicScheme};
use super::cookie::CookieScheme;
use super::{SchemeKind, SessionPayload};
use crate::errors::AuthError;

/// The closed set of authentication schemes.
#[derive(Clone)]
pub enum Scheme {
    Basic(BasicScheme),
    Cookie(CookieScheme),
}

/// Credentials as pulled off the wire, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawCredentials {
    Basic(BasicCredentials),
    Session(SessionPayload),
}

impl Scheme {
    pub fn kind(&self) -> SchemeKind {
        match self {
            Scheme::Basic(_) => SchemeKind::Basic,
            Scheme::Cookie(_) => SchemeKind::Cookie,
        }
    }

    pub fn extract(&self, headers: &HeaderMap) -> Result<RawCredentials, AuthError> {
        match self {
            Scheme::Basic(basic) => basic.extract(headers).map(RawCredentials::Basic),
            Scheme::Cookie(cookie) => cookie.extract(headers).map(RawCredentials::Session),
        }
    }

    /// Runs the validator over extracted credentials and returns the value to
    /// attach to the request.
    pub async fn enforce(&self, raw: RawCredentials) -> Result<Value, AuthError> {
        match (self, raw) {
            (Scheme::Basic(basic), RawCredentials::Basic(credentials)) => basic.enforce(&credentials).await,
            (Scheme::Cookie(cookie), RawCredentials::Session(session)) => cookie.enforce(session).await,
            _ => Err(AuthError::InvalidStrategyConfig(
                "credentials do not match the scheme".into(),
            )),
        }
    }

    /// Extraction strictly followed by validation.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<Value, AuthError> {
        let raw = self.extract(headers)?;
        self.enforce(raw).await
    }

    pub fn as_basic(&self) -> Option<&BasicScheme> {
        match self {
            Scheme::Basic(basic) => Some(basic),
            Scheme::Cookie(_) => None,
        }
    }

    pub fn as_cookie(&self) -> Option<&CookieScheme> {
        match self {
            Scheme::Cookie(cookie) => Some(cookie),
            Scheme::Basic(_) => None,
        }
    }
}
