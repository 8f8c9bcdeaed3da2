//! Request authentication: schemes, named strategies, and the per-request
//! decision engine.
//!
//! - A [`Scheme`] knows how credentials travel (Basic header, sealed cookie).
//! - A [`Strategy`] is a named, configured scheme held by the [`AuthRegistry`].
//! - The [`DecisionEngine`] resolves a route's [`AuthMode`] against the
//!   registry and turns the scheme's verdict into an [`AuthDecision`].

pub mod basic;
pub mod cookie;
pub mod engine;
pub mod middleware;
pub mod registry;
pub mod scheme;
pub mod strategy;
pub mod validator;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use basic::{BasicCredentials, BasicScheme};
pub use cookie::{CookieOptions, CookieScheme, SessionSealer};
pub use engine::{AuthDecision, AuthPlan, AuthRequest, DecisionEngine, Denial, Outcome};
pub use middleware::{enforce, enforce_routes, AuthContext, Authenticated, RouteGuard, RouteGuards};
pub use registry::AuthRegistry;
pub use scheme::{RawCredentials, Scheme};
pub use strategy::{Strategy, StrategyConfig, Validator};
pub use validator::{
    basic_validator_fn, session_validator_fn, BasicValidator, SessionValidator, StoreBasicValidator,
    StoreSessionValidator, Validation,
};

/// Session state carried by the cookie scheme.
pub type SessionPayload = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemeKind {
    Basic,
    Cookie,
}

/// Identity attached to a request after an allow decision. Lives only as long
/// as the request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Credentials {
    pub strategy: String,
    pub scheme: SchemeKind,
    pub data: Value,
}

impl Credentials {
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }
}

/// Route-side alias for the registry default; never a registrable name.
pub const DEFAULT_STRATEGY: &str = "default";

/// Which strategy a route asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyRef {
    /// Whatever the registry currently marks as default.
    Default,
    Named(String),
}

impl From<&str> for StrategyRef {
    fn from(value: &str) -> Self {
        if value == DEFAULT_STRATEGY {
            StrategyRef::Default
        } else {
            StrategyRef::Named(value.to_string())
        }
    }
}

/// Per-route authentication policy.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthMode {
    /// Nothing declared on the route; the registry default applies as required.
    #[default]
    Inherit,
    /// Authentication is skipped entirely.
    Disabled,
    Required(StrategyRef),
    /// Authenticate if possible; a failure lets the request through anonymously.
    Try(StrategyRef),
}

impl AuthMode {
    pub fn required(strategy: impl Into<StrategyRef>) -> Self {
        AuthMode::Required(strategy.into())
    }

    pub fn optional(strategy: impl Into<StrategyRef>) -> Self {
        AuthMode::Try(strategy.into())
    }
}
