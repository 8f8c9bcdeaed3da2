use std::sync::Arc;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use axum::http::HeaderMap;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use hkdf::Hkdf;
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;

use super::validator::SessionValidator;
use super::SessionPayload;
use crate::config::MIN_SECRET_LENGTH;
use crate::errors::AuthError;
use crate::utils::unix_now;

const NONCE_LEN: usize = 12;
const KEY_INFO: &[u8] = b"route-auth-session-cookie";

/// What actually goes inside the cookie.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SealedSession {
    pub iat: i64,
    pub payload: SessionPayload,
}

/// Encrypts and authenticates session payloads with AES-256-GCM.
///
/// The key is derived from the configured secret with HKDF-SHA256. A cookie
/// value is `base64url(nonce || ciphertext || tag)`, so any modification or a
/// different secret fails the tag check.
#[derive(Clone)]
pub struct SessionSealer {
    cipher: Aes256Gcm,
}

impl SessionSealer {
    pub fn new(secret: &[u8]) -> Result<Self, AuthError> {
        if secret.len() < MIN_SECRET_LENGTH {
            return Err(AuthError::InvalidStrategyConfig(format!(
                "cookie secret must be at least {MIN_SECRET_LENGTH} bytes"
            )));
        }

        let hkdf = Hkdf::<Sha256>::new(None, secret);
        let mut key = [0u8; 32];
        hkdf.expand(KEY_INFO, &mut key)
            .map_err(|err| AuthError::InvalidStrategyConfig(format!("key derivation failed: {err}")))?;

        Ok(Self {
            cipher: Aes256Gcm::new((&key).into()),
        })
    }

    pub fn seal(&self, session: &SealedSession) -> Result<String, AuthError> {
        let plaintext =
            serde_json::to_vec(session).map_err(|err| AuthError::SessionEncoding(err.to_string()))?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_slice())
            .map_err(|err| AuthError::SessionEncoding(err.to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);

        Ok(URL_SAFE_NO_PAD.encode(sealed))
    }

    /// Every failure mode (bad base64, short value, tag mismatch, bad JSON)
    /// reports as `InvalidSignature`.
    pub fn unseal(&self, value: &str) -> Result<SealedSession, AuthError> {
        let sealed = URL_SAFE_NO_PAD
            .decode(value)
            .map_err(|_| AuthError::InvalidSignature)?;
        if sealed.len() <= NONCE_LEN {
            return Err(AuthError::InvalidSignature);
        }

        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| AuthError::InvalidSignature)?;

        serde_json::from_slice(&plaintext).map_err(|_| AuthError::InvalidSignature)
    }
}

/// Cookie attributes and login-page behaviour for a cookie strategy.
#[derive(Debug, Clone)]
pub struct CookieOptions {
    pub name: String,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: SameSite,
    pub ttl: Option<chrono::Duration>,
    pub redirect_to: Option<String>,
    /// Query parameter that carries the original path on redirect.
    pub append_next: Option<String>,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            name: "session".to_string(),
            path: "/".to_string(),
            secure: true,
            http_only: true,
            same_site: SameSite::Lax,
            ttl: None,
            redirect_to: None,
            append_next: None,
        }
    }
}

/// Session scheme backed by a sealed cookie.
///
/// Issuing a session is an explicit application action ([`CookieScheme::issue`]).
/// The request path only reads and re-validates.
#[derive(Clone)]
pub struct CookieScheme {
    options: CookieOptions,
    sealer: SessionSealer,
    validator: Arc<dyn SessionValidator>,
}

impl CookieScheme {
    pub fn new(secret: &[u8], validator: Arc<dyn SessionValidator>) -> Result<Self, AuthError> {
        Self::with_options(secret, validator, CookieOptions::default())
    }

    pub fn with_options(
        secret: &[u8],
        validator: Arc<dyn SessionValidator>,
        options: CookieOptions,
    ) -> Result<Self, AuthError> {
        if options.name.is_empty() {
            return Err(AuthError::InvalidStrategyConfig("cookie name must not be empty".into()));
        }

        Ok(Self {
            options,
            sealer: SessionSealer::new(secret)?,
            validator,
        })
    }

    pub fn options(&self) -> &CookieOptions {
        &self.options
    }

    pub fn cookie_name(&self) -> &str {
        &self.options.name
    }

    /// Seals `payload` into a ready-to-send cookie.
    pub fn issue(&self, payload: SessionPayload) -> Result<Cookie<'static>, AuthError> {
        let value = self.encode(payload)?;
        let mut cookie = self.base_cookie(value);
        if let Some(ttl) = self.options.ttl {
            cookie.set_max_age(time::Duration::seconds(ttl.num_seconds()));
        }
        Ok(cookie)
    }

    pub fn encode(&self, payload: SessionPayload) -> Result<String, AuthError> {
        self.sealer.seal(&SealedSession {
            iat: unix_now(),
            payload,
        })
    }

    /// Unseals a cookie value and checks the configured lifetime.
    pub fn decode(&self, value: &str) -> Result<SessionPayload, AuthError> {
        let sealed = self.sealer.unseal(value)?;

        if let Some(ttl) = self.options.ttl {
            if unix_now() - sealed.iat > ttl.num_seconds() {
                return Err(AuthError::SessionExpired);
            }
        }

        Ok(sealed.payload)
    }

    /// An already-expired cookie that makes the client drop the session.
    pub fn clear(&self) -> Cookie<'static> {
        let mut cookie = self.base_cookie(String::new());
        cookie.set_max_age(time::Duration::ZERO);
        cookie.set_expires(time::OffsetDateTime::UNIX_EPOCH);
        cookie
    }

    pub fn extract(&self, headers: &HeaderMap) -> Result<SessionPayload, AuthError> {
        let jar = CookieJar::from_headers(headers);
        let cookie = jar
            .get(&self.options.name)
            .filter(|cookie| !cookie.value().is_empty())
            .ok_or(AuthError::MissingCookie)?;

        self.decode(cookie.value())
    }

    pub async fn enforce(&self, session: SessionPayload) -> Result<Value, AuthError> {
        let validation = self
            .validator
            .validate(&session)
            .await
            .map_err(|err| AuthError::ValidatorFailed(err.to_string()))?;

        if !validation.valid {
            return Err(AuthError::ValidatorRejected);
        }

        match validation.credentials {
            Some(credentials) => Ok(credentials),
            None => serde_json::to_value(session).map_err(|err| AuthError::SessionEncoding(err.to_string())),
        }
    }

    /// Where an unauthenticated request should be sent, if anywhere.
    pub fn redirect_location(&self, request_path: &str) -> Option<String> {
        let target = self.options.redirect_to.as_ref()?;

        match &self.options.append_next {
            Some(param) => {
                let separator = if target.contains('?') { '&' } else { '?' };
                Some(format!(
                    "{target}{separator}{param}={}",
                    urlencoding::encode(request_path)
                ))
            }
            None => Some(target.clone()),
        }
    }

    fn base_cookie(&self, value: String) -> Cookie<'static> {
        Cookie::build((self.options.name.clone(), value))
            .path(self.options.path.clone())
            .secure(self.options.secure)
            .http_only(self.options.http_only)
            .same_site(self.options.same_site)
            .build()
    }
}
