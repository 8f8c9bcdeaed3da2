use std::sync::Arc;

use axum::http::Method;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth::{
    enforce_routes, AuthMode, AuthRegistry, BasicScheme, CookieScheme, DecisionEngine, RouteGuards, Strategy,
    StrategyConfig, StoreBasicValidator, StoreSessionValidator, Validator, DEFAULT_STRATEGY,
};
use crate::config::AuthSettings;
use crate::errors::{AppError, AppResult, AuthError};
use crate::routes::{auth, health};
use crate::store::CredentialStore;

pub const BASIC_STRATEGY: &str = "login-basic";
pub const COOKIE_STRATEGY: &str = "login-cookie";

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<DecisionEngine>,
    pub store: Arc<dyn CredentialStore>,
    pub sessions: Arc<Strategy>,
}

impl AppState {
    pub fn session_scheme(&self) -> AppResult<&CookieScheme> {
        self.sessions
            .as_cookie()
            .ok_or_else(|| AppError::internal("session strategy is not cookie based"))
    }
}

/// Registers the Basic strategy and the default cookie strategy.
pub fn build_registry(settings: &AuthSettings, store: Arc<dyn CredentialStore>) -> Result<AuthRegistry, AppError> {
    let mut registry = AuthRegistry::new();

    registry.register(Strategy::basic(
        BASIC_STRATEGY,
        BasicScheme::new(Arc::new(StoreBasicValidator::new(store.clone()))),
    ))?;

    let mut cookie = StrategyConfig::cookie(COOKIE_STRATEGY, settings.session_secret.clone());
    cookie.cookie_name = Some(settings.cookie_name.clone());
    cookie.secure_flag = Some(settings.cookie_secure);
    cookie.redirect_target = Some(settings.login_redirect.clone());
    cookie.ttl_hours = settings.session_ttl_hours;
    let cookie = cookie.into_strategy(Validator::Session(Arc::new(StoreSessionValidator::new(store))))?;
    registry.register_default(cookie)?;

    Ok(registry)
}

/// Auth modes of the demo routes. Anything not listed here runs under the
/// registry default.
pub fn route_guards(engine: Arc<DecisionEngine>) -> Result<RouteGuards, AuthError> {
    RouteGuards::new(engine)?
        // "/" shows the login form or a greeting; it never forces a login.
        .route("/", AuthMode::optional(DEFAULT_STRATEGY))?
        .route_method(Method::GET, "/login", AuthMode::required(BASIC_STRATEGY))?
        .route_method(Method::POST, "/login", AuthMode::optional(DEFAULT_STRATEGY))?
        .route("/logout", AuthMode::Disabled)?
        .route("/api/health", AuthMode::Disabled)
}

pub fn create_app(settings: &AuthSettings, store: Arc<dyn CredentialStore>) -> Result<Router, AppError> {
    let registry = build_registry(settings, store.clone())?;
    let sessions = registry.resolve(COOKIE_STRATEGY)?;
    let engine = Arc::new(DecisionEngine::new(Arc::new(registry)));
    let guards = route_guards(engine.clone())?;

    let state = AppState {
        engine,
        store,
        sessions,
    };

    let router = Router::new()
        .route("/", get(auth::home))
        .route("/login", get(auth::basic_login).post(auth::login))
        .route("/welcome", get(auth::welcome))
        .route("/logout", post(auth::logout).get(auth::logout))
        .route("/api/health", get(health::health))
        .route_layer(from_fn_with_state(guards, enforce_routes))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    Ok(router)
}
