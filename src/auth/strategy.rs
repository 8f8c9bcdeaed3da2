use std::sync::Arc;

use serde::Deserialize;

use super::basic::BasicScheme;
use super::cookie::{CookieOptions, CookieScheme};
use super::scheme::Scheme;
use super::validator::{BasicValidator, SessionValidator};
use super::SchemeKind;
use crate::errors::AuthError;

/// A named, configured scheme. Immutable once registered.
#[derive(Clone)]
pub struct Strategy {
    name: String,
    scheme: Scheme,
}

impl Strategy {
    pub fn new(name: impl Into<String>, scheme: Scheme) -> Self {
        Self {
            name: name.into(),
            scheme,
        }
    }

    pub fn basic(name: impl Into<String>, scheme: BasicScheme) -> Self {
        Self::new(name, Scheme::Basic(scheme))
    }

    pub fn cookie(name: impl Into<String>, scheme: CookieScheme) -> Self {
        Self::new(name, Scheme::Cookie(scheme))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scheme(&self) -> &Scheme {
        &self.scheme
    }

    pub fn kind(&self) -> SchemeKind {
        self.scheme.kind()
    }

    pub fn as_cookie(&self) -> Option<&CookieScheme> {
        self.scheme.as_cookie()
    }
}

impl std::fmt::Debug for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Strategy")
            .field("name", &self.name)
            .field("scheme", &self.kind())
            .finish()
    }
}

/// Validator handed to a [`StrategyConfig`]; must match the scheme.
#[derive(Clone)]
pub enum Validator {
    Basic(Arc<dyn BasicValidator>),
    Session(Arc<dyn SessionValidator>),
}

/// Declarative strategy description, e.g. loaded from settings.
#[derive(Debug, Clone, Deserialize)]
pub struct StrategyConfig {
    pub name: String,
    pub scheme: SchemeKind,
    #[serde(default)]
    pub realm: Option<String>,
    #[serde(default)]
    pub cookie_name: Option<String>,
    #[serde(default)]
    pub signing_secret: Option<String>,
    #[serde(default)]
    pub secure_flag: Option<bool>,
    #[serde(default)]
    pub redirect_target: Option<String>,
    #[serde(default)]
    pub ttl_hours: Option<i64>,
    #[serde(default)]
    pub append_next: Option<String>,
}

impl StrategyConfig {
    pub fn basic(name: impl Into<String>) -> Self {
        Self::empty(name.into(), SchemeKind::Basic)
    }

    pub fn cookie(name: impl Into<String>, signing_secret: impl Into<String>) -> Self {
        let mut config = Self::empty(name.into(), SchemeKind::Cookie);
        config.signing_secret = Some(signing_secret.into());
        config
    }

    fn empty(name: String, scheme: SchemeKind) -> Self {
        Self {
            name,
            scheme,
            realm: None,
            cookie_name: None,
            signing_secret: None,
            secure_flag: None,
            redirect_target: None,
            ttl_hours: None,
            append_next: None,
        }
    }

    pub fn into_strategy(self, validator: Validator) -> Result<Strategy, AuthError> {
        if self.name.is_empty() {
            return Err(AuthError::InvalidStrategyConfig("strategy name must not be empty".into()));
        }

        let scheme = match (self.scheme, validator) {
            (SchemeKind::Basic, Validator::Basic(validator)) => {
                let mut basic = BasicScheme::new(validator);
                if let Some(realm) = self.realm {
                    basic = basic.with_realm(realm);
                }
                Scheme::Basic(basic)
            }
            (SchemeKind::Cookie, Validator::Session(validator)) => {
                let secret = self.signing_secret.ok_or_else(|| {
                    AuthError::InvalidStrategyConfig(format!("{}: signing secret is required", self.name))
                })?;

                let defaults = CookieOptions::default();
                let ttl = match self.ttl_hours {
                    Some(hours) if hours <= 0 => {
                        return Err(AuthError::InvalidStrategyConfig(format!(
                            "{}: ttl must be positive",
                            self.name
                        )))
                    }
                    Some(hours) => Some(chrono::Duration::try_hours(hours).ok_or_else(|| {
                        AuthError::InvalidStrategyConfig(format!("{}: ttl of {hours} hours is out of range", self.name))
                    })?),
                    None => None,
                };

                let options = CookieOptions {
                    name: self.cookie_name.unwrap_or(defaults.name),
                    secure: self.secure_flag.unwrap_or(defaults.secure),
                    ttl,
                    redirect_to: self.redirect_target,
                    append_next: self.append_next,
                    ..defaults
                };

                Scheme::Cookie(CookieScheme::with_options(secret.as_bytes(), validator, options)?)
            }
            (kind, _) => {
                return Err(AuthError::InvalidStrategyConfig(format!(
                    "{}: validator does not fit the {kind:?} scheme",
                    self.name
                )))
            }
        };

        Ok(Strategy::new(self.name, scheme))
    }
}
