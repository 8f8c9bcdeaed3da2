use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use axum::async_trait;
use axum::extract::{FromRequestParts, MatchedPath, Request, State};
use axum::http::header::{SET_COOKIE, WWW_AUTHENTICATE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue, Method};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::Cookie;

use super::engine::{AuthPlan, AuthRequest, DecisionEngine, Outcome};
use super::{AuthMode, Credentials};
use crate::errors::{AppError, AuthError};

/// A route's auth mode, resolved once when the router is built.
///
/// Construction fails on an unknown strategy name or a missing default, so a
/// misconfigured route table never starts serving.
#[derive(Clone)]
pub struct RouteGuard {
    engine: Arc<DecisionEngine>,
    plan: Arc<AuthPlan>,
    mode: AuthMode,
}

impl RouteGuard {
    pub fn new(engine: Arc<DecisionEngine>, mode: AuthMode) -> Result<Self, AuthError> {
        let plan = engine.plan(&mode)?;
        Ok(Self {
            engine,
            plan: Arc::new(plan),
            mode,
        })
    }

    pub fn mode(&self) -> &AuthMode {
        &self.mode
    }

    pub fn plan(&self) -> &AuthPlan {
        &self.plan
    }
}

/// Middleware for a single route guard. Prefer [`RouteGuards`] for a whole
/// router so undeclared routes still get the default strategy.
pub async fn enforce(State(guard): State<RouteGuard>, request: Request, next: Next) -> Response {
    run_guard(&guard, request, next).await
}

/// Route table of auth modes. Any route without an entry runs
/// [`AuthMode::Inherit`], i.e. the registry default as required, so a route
/// is only open when it says so.
#[derive(Clone)]
pub struct RouteGuards {
    engine: Arc<DecisionEngine>,
    fallback: RouteGuard,
    paths: HashMap<String, RouteGuard>,
    methods: HashMap<(Method, String), RouteGuard>,
}

impl RouteGuards {
    pub fn new(engine: Arc<DecisionEngine>) -> Result<Self, AuthError> {
        let fallback = RouteGuard::new(engine.clone(), AuthMode::Inherit)?;
        Ok(Self {
            engine,
            fallback,
            paths: HashMap::new(),
            methods: HashMap::new(),
        })
    }

    /// Declares `mode` for every method on `path` (the route pattern, e.g.
    /// `/users/:id`).
    pub fn route(mut self, path: &str, mode: AuthMode) -> Result<Self, AuthError> {
        let guard = RouteGuard::new(self.engine.clone(), mode)?;
        self.paths.insert(path.to_string(), guard);
        Ok(self)
    }

    /// Declares `mode` for one method on `path`; wins over [`RouteGuards::route`].
    pub fn route_method(mut self, method: Method, path: &str, mode: AuthMode) -> Result<Self, AuthError> {
        let guard = RouteGuard::new(self.engine.clone(), mode)?;
        self.methods.insert((method, path.to_string()), guard);
        Ok(self)
    }

    pub fn guard_for(&self, method: &Method, path: &str) -> &RouteGuard {
        let by_method = |method: &Method| self.methods.get(&(method.clone(), path.to_string()));
        by_method(method)
            // axum answers HEAD with the GET handler
            .or_else(|| (*method == Method::HEAD).then(|| by_method(&Method::GET)).flatten())
            .or_else(|| self.paths.get(path))
            .unwrap_or(&self.fallback)
    }
}

/// Router-wide middleware; install with `Router::route_layer` after all
/// routes are added so the matched route pattern is available.
pub async fn enforce_routes(State(guards): State<RouteGuards>, request: Request, next: Next) -> Response {
    let path = match request.extensions().get::<MatchedPath>() {
        Some(matched) => matched.as_str().to_string(),
        None => request.uri().path().to_string(),
    };
    let guard = guards.guard_for(request.method(), &path).clone();
    run_guard(&guard, request, next).await
}

/// Turns an auth decision into an HTTP outcome: 401 (with a challenge for
/// Basic), a redirect, or the inner handler with an [`AuthContext`] in the
/// request extensions.
async fn run_guard(guard: &RouteGuard, mut request: Request, next: Next) -> Response {
    // The request body is not Sync, so nothing borrowed from the request may
    // live across the await.
    let headers = request.headers().clone();
    let path = request.uri().path().to_string();
    let decision = guard
        .engine
        .decide(&guard.plan, AuthRequest::new(&headers, &path))
        .await;

    let clear_cookie = decision.clear_cookie.clone();
    let strategy = decision.strategy.clone();

    let mut response = match decision.outcome {
        Outcome::Allow(credentials) => {
            request.extensions_mut().insert(AuthContext { credentials, strategy });
            next.run(request).await
        }
        Outcome::Redirect(location) => Redirect::to(&location).into_response(),
        Outcome::Deny(denial) => {
            let mut response = AppError::from(denial.reason).into_response();
            if let Some(value) = denial.challenge.and_then(|c| HeaderValue::from_str(&c).ok()) {
                response.headers_mut().insert(WWW_AUTHENTICATE, value);
            }
            response
        }
    };

    // A handler that already wrote this cookie (e.g. a fresh login) wins.
    if let Some(cookie) = clear_cookie {
        if !sets_cookie(response.headers(), cookie.name()) {
            append_cookie(response.headers_mut(), &cookie);
        }
    }

    response
}

fn sets_cookie(headers: &HeaderMap, name: &str) -> bool {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| Cookie::parse(value.to_string()).ok())
        .any(|cookie| cookie.name() == name)
}

fn append_cookie(headers: &mut HeaderMap, cookie: &Cookie<'static>) {
    if let Ok(value) = HeaderValue::from_str(&cookie.to_string()) {
        headers.append(SET_COOKIE, value);
    }
}

/// Authentication state of the current request. Anonymous when the route is
/// unguarded or a `try` route failed to authenticate.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    pub credentials: Option<Credentials>,
    pub strategy: Option<String>,
}

impl AuthContext {
    pub fn is_authenticated(&self) -> bool {
        self.credentials.is_some()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<AuthContext>().cloned().unwrap_or_default())
    }
}

/// Credentials that must be present; rejects with 401 otherwise.
#[derive(Debug, Clone)]
pub struct Authenticated(pub Credentials);

#[async_trait]
impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .and_then(|ctx| ctx.credentials.clone())
            .map(Authenticated)
            .ok_or_else(|| AppError::unauthorized("authentication required"))
    }
}
