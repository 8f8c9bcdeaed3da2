use std::sync::Arc;

use axum::http::HeaderMap;
use axum_extra::extract::cookie::Cookie;

use super::registry::AuthRegistry;
use super::scheme::Scheme;
use super::strategy::Strategy;
use super::{AuthMode, Credentials};
use crate::errors::AuthError;

/// The slice of an incoming request the engine looks at.
#[derive(Debug, Clone, Copy)]
pub struct AuthRequest<'a> {
    pub headers: &'a HeaderMap,
    pub path: &'a str,
}

impl<'a> AuthRequest<'a> {
    pub fn new(headers: &'a HeaderMap, path: &'a str) -> Self {
        Self { headers, path }
    }
}

/// A route's auth mode resolved against the registry.
#[derive(Debug, Clone)]
pub enum AuthPlan {
    Skip,
    Enforce { strategy: Arc<Strategy>, try_mode: bool },
}

impl AuthPlan {
    pub fn strategy(&self) -> Option<&Arc<Strategy>> {
        match self {
            AuthPlan::Skip => None,
            AuthPlan::Enforce { strategy, .. } => Some(strategy),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denial {
    pub reason: AuthError,
    /// `WWW-Authenticate` value, for schemes that issue a challenge.
    pub challenge: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// `None` means the request proceeds unauthenticated.
    Allow(Option<Credentials>),
    Deny(Denial),
    Redirect(String),
}

/// Result of authenticating one request. Never persisted.
#[derive(Debug, Clone)]
pub struct AuthDecision {
    pub outcome: Outcome,
    pub strategy: Option<String>,
    /// Expiring cookie to send back when a session was rejected.
    pub clear_cookie: Option<Cookie<'static>>,
}

impl AuthDecision {
    fn anonymous() -> Self {
        Self {
            outcome: Outcome::Allow(None),
            strategy: None,
            clear_cookie: None,
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self.outcome, Outcome::Allow(_))
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        match &self.outcome {
            Outcome::Allow(credentials) => credentials.as_ref(),
            _ => None,
        }
    }

    pub fn into_credentials(self) -> Option<Credentials> {
        match self.outcome {
            Outcome::Allow(credentials) => credentials,
            _ => None,
        }
    }
}

/// Per-request orchestration of strategy selection, extraction, validation
/// and outcome.
///
/// The engine holds no per-request state and never issues credentials. If the
/// future returned by [`DecisionEngine::decide`] is dropped mid-validation the
/// decision is simply abandoned; nothing has been attached or sent.
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    registry: Arc<AuthRegistry>,
}

impl DecisionEngine {
    pub fn new(registry: Arc<AuthRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &AuthRegistry {
        &self.registry
    }

    /// Resolves a route's mode. Errors here are startup misconfigurations.
    ///
    /// Precedence: an explicit route mode wins, an undeclared mode falls back
    /// to the registry default as required, and with no default nothing is
    /// enforced.
    pub fn plan(&self, mode: &AuthMode) -> Result<AuthPlan, AuthError> {
        let plan = match mode {
            AuthMode::Disabled => AuthPlan::Skip,
            AuthMode::Inherit => match self.registry.default_name() {
                Some(_) => AuthPlan::Enforce {
                    strategy: self.registry.default_strategy()?,
                    try_mode: false,
                },
                None => AuthPlan::Skip,
            },
            AuthMode::Required(strategy) => AuthPlan::Enforce {
                strategy: self.registry.resolve_ref(strategy)?,
                try_mode: false,
            },
            AuthMode::Try(strategy) => AuthPlan::Enforce {
                strategy: self.registry.resolve_ref(strategy)?,
                try_mode: true,
            },
        };
        Ok(plan)
    }

    /// Checks a whole route table up front.
    pub fn validate_routes<'m>(&self, modes: impl IntoIterator<Item = &'m AuthMode>) -> Result<(), AuthError> {
        for mode in modes {
            self.plan(mode)?;
        }
        Ok(())
    }

    pub async fn decide(&self, plan: &AuthPlan, request: AuthRequest<'_>) -> AuthDecision {
        let (strategy, try_mode) = match plan {
            AuthPlan::Skip => return AuthDecision::anonymous(),
            AuthPlan::Enforce { strategy, try_mode } => (strategy, *try_mode),
        };

        let scheme = strategy.scheme();
        let result = scheme.authenticate(request.headers).await;

        let mut decision = AuthDecision {
            outcome: Outcome::Allow(None),
            strategy: Some(strategy.name().to_string()),
            clear_cookie: None,
        };

        match result {
            Ok(data) => {
                tracing::debug!(strategy = %strategy.name(), path = %request.path, "authenticated");
                decision.outcome = Outcome::Allow(Some(Credentials {
                    strategy: strategy.name().to_string(),
                    scheme: strategy.kind(),
                    data,
                }));
            }
            Err(reason) => {
                if let AuthError::ValidatorFailed(message) = &reason {
                    tracing::warn!(strategy = %strategy.name(), error = %message, "validator failed");
                }

                if let Scheme::Cookie(cookie) = scheme {
                    if rejects_session(&reason) {
                        decision.clear_cookie = Some(cookie.clear());
                    }
                }

                decision.outcome = if try_mode {
                    Outcome::Allow(None)
                } else {
                    match scheme {
                        Scheme::Cookie(cookie) => match cookie.redirect_location(request.path) {
                            Some(location) => Outcome::Redirect(location),
                            None => Outcome::Deny(Denial {
                                reason: reason.clone(),
                                challenge: None,
                            }),
                        },
                        Scheme::Basic(basic) => Outcome::Deny(Denial {
                            reason: reason.clone(),
                            challenge: Some(basic.challenge()),
                        }),
                    }
                };

                tracing::debug!(
                    strategy = %strategy.name(),
                    path = %request.path,
                    reason = %reason,
                    try_mode,
                    "authentication failed"
                );
            }
        }

        decision
    }

    /// `plan` followed by `decide`, for callers that do not cache plans.
    pub async fn evaluate(&self, mode: &AuthMode, request: AuthRequest<'_>) -> Result<AuthDecision, AuthError> {
        let plan = self.plan(mode)?;
        Ok(self.decide(&plan, request).await)
    }
}

/// A cookie was present but the server will not honour it.
fn rejects_session(reason: &AuthError) -> bool {
    matches!(
        reason,
        AuthError::InvalidSignature | AuthError::SessionExpired | AuthError::ValidatorRejected
    )
}
