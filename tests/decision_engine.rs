use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::{AUTHORIZATION, COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue, Request, StatusCode};
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::Router;
use serde_json::json;
use tokio::sync::Notify;
use tokio::time::timeout;
use tower::util::ServiceExt;

use route_auth::auth::basic::encode_authorization;
use route_auth::auth::{
    basic_validator_fn, session_validator_fn, AuthMode, AuthPlan, AuthRegistry, AuthRequest, BasicScheme,
    enforce, CookieOptions, CookieScheme, DecisionEngine, Outcome, RouteGuard, SchemeKind, SessionPayload,
    SessionValidator, Strategy, Validation,
};
use route_auth::errors::AuthError;

const SECRET: &[u8] = b"hello123hello123hello123hello123";

fn basic_strategy() -> Strategy {
    let validator = basic_validator_fn(|username, password| {
        if username == "jmenon" && password == "1234" {
            Validation::valid(json!({ "id": 0, "name": "Jayant Menon" }))
        } else {
            Validation::invalid()
        }
    });
    Strategy::basic("login-basic", BasicScheme::new(validator))
}

fn cookie_scheme(redirect_to: Option<&str>) -> CookieScheme {
    let validator = session_validator_fn(|session| {
        if session.get("username").map(String::as_str) == Some("Jayant") {
            Validation::accepted()
        } else {
            Validation::invalid()
        }
    });
    let options = CookieOptions {
        redirect_to: redirect_to.map(str::to_string),
        secure: false,
        ..CookieOptions::default()
    };
    CookieScheme::with_options(SECRET, validator, options).unwrap()
}

fn engine(default: Option<&str>) -> DecisionEngine {
    let mut registry = AuthRegistry::new();
    registry.register(basic_strategy()).unwrap();
    registry
        .register(Strategy::cookie("login-cookie", cookie_scheme(Some("/"))))
        .unwrap();
    registry
        .register(Strategy::cookie("quiet-cookie", cookie_scheme(None)))
        .unwrap();
    if let Some(name) = default {
        registry.set_default(name).unwrap();
    }
    DecisionEngine::new(Arc::new(registry))
}

fn session_headers(username: &str) -> Result<HeaderMap> {
    let mut payload = SessionPayload::new();
    payload.insert("username".to_string(), username.to_string());
    let cookie = cookie_scheme(None).issue(payload)?;

    let mut headers = HeaderMap::new();
    headers.insert(COOKIE, HeaderValue::from_str(&format!("session={}", cookie.value()))?);
    Ok(headers)
}

fn basic_headers(username: &str, password: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&encode_authorization(username, password))?,
    );
    Ok(headers)
}

#[tokio::test]
async fn disabled_mode_allows_without_credentials() -> Result<()> {
    let engine = engine(Some("login-cookie"));
    let headers = HeaderMap::new();

    let decision = engine
        .evaluate(&AuthMode::Disabled, AuthRequest::new(&headers, "/"))
        .await?;
    assert_eq!(decision.outcome, Outcome::Allow(None));
    assert!(decision.strategy.is_none());
    Ok(())
}

#[tokio::test]
async fn inherit_without_default_skips_auth() -> Result<()> {
    let engine = engine(None);
    assert!(matches!(engine.plan(&AuthMode::Inherit)?, AuthPlan::Skip));
    Ok(())
}

#[tokio::test]
async fn inherit_behaves_like_required_default() -> Result<()> {
    let engine = engine(Some("login-cookie"));
    let empty = HeaderMap::new();
    let session = session_headers("Jayant")?;

    for headers in [&empty, &session] {
        let inherited = engine
            .evaluate(&AuthMode::Inherit, AuthRequest::new(headers, "/welcome"))
            .await?;
        let explicit = engine
            .evaluate(&AuthMode::required("login-cookie"), AuthRequest::new(headers, "/welcome"))
            .await?;
        assert_eq!(inherited.outcome, explicit.outcome);
        assert_eq!(inherited.strategy, explicit.strategy);
    }
    Ok(())
}

#[tokio::test]
async fn explicit_route_mode_ignores_the_default() -> Result<()> {
    let engine = engine(Some("login-cookie"));
    let headers = basic_headers("jmenon", "1234")?;

    let decision = engine
        .evaluate(&AuthMode::required("login-basic"), AuthRequest::new(&headers, "/login"))
        .await?;

    let credentials = decision.credentials().expect("allowed");
    assert_eq!(credentials.strategy, "login-basic");
    assert_eq!(credentials.scheme, SchemeKind::Basic);
    assert_eq!(credentials.data, json!({ "id": 0, "name": "Jayant Menon" }));
    Ok(())
}

#[tokio::test]
async fn basic_denial_carries_a_challenge_and_never_redirects() -> Result<()> {
    let engine = engine(None);
    let headers = basic_headers("jmenon", "wrong")?;

    let decision = engine
        .evaluate(&AuthMode::required("login-basic"), AuthRequest::new(&headers, "/login"))
        .await?;

    match decision.outcome {
        Outcome::Deny(denial) => {
            assert_eq!(denial.reason, AuthError::ValidatorRejected);
            assert_eq!(denial.challenge.as_deref(), Some("Basic realm=\"Authentication\""));
        }
        other => panic!("expected deny, got {other:?}"),
    }
    assert!(decision.clear_cookie.is_none());
    Ok(())
}

#[tokio::test]
async fn cookie_failure_redirects_when_configured() -> Result<()> {
    let engine = engine(None);
    let headers = HeaderMap::new();

    let decision = engine
        .evaluate(&AuthMode::required("login-cookie"), AuthRequest::new(&headers, "/welcome"))
        .await?;
    assert_eq!(decision.outcome, Outcome::Redirect("/".to_string()));
    // Nothing to clear when no cookie was sent.
    assert!(decision.clear_cookie.is_none());
    Ok(())
}

#[tokio::test]
async fn cookie_failure_without_redirect_denies() -> Result<()> {
    let engine = engine(None);
    let headers = HeaderMap::new();

    let decision = engine
        .evaluate(&AuthMode::required("quiet-cookie"), AuthRequest::new(&headers, "/welcome"))
        .await?;
    match decision.outcome {
        Outcome::Deny(denial) => {
            assert_eq!(denial.reason, AuthError::MissingCookie);
            assert!(denial.challenge.is_none());
        }
        other => panic!("expected deny, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn rejected_session_is_cleared() -> Result<()> {
    let engine = engine(None);
    let headers = session_headers("Mallory")?;

    let decision = engine
        .evaluate(&AuthMode::required("quiet-cookie"), AuthRequest::new(&headers, "/welcome"))
        .await?;
    assert!(!decision.is_allowed());

    let cleared = decision.clear_cookie.expect("cookie cleared");
    assert_eq!(cleared.name(), "session");
    assert_eq!(cleared.value(), "");
    Ok(())
}

#[tokio::test]
async fn try_mode_downgrades_every_failure() -> Result<()> {
    let engine = engine(None);
    let cases = [
        ("login-basic", basic_headers("jmenon", "wrong")?),
        ("login-basic", HeaderMap::new()),
        ("login-cookie", HeaderMap::new()),
        ("login-cookie", session_headers("Mallory")?),
        ("quiet-cookie", session_headers("Mallory")?),
    ];

    for (strategy, headers) in &cases {
        let decision = engine
            .evaluate(&AuthMode::optional(*strategy), AuthRequest::new(headers, "/"))
            .await?;
        assert_eq!(decision.outcome, Outcome::Allow(None), "strategy {strategy}");
    }
    Ok(())
}

#[tokio::test]
async fn try_mode_still_attaches_valid_credentials() -> Result<()> {
    let engine = engine(Some("login-cookie"));
    let headers = session_headers("Jayant")?;

    let decision = engine
        .evaluate(&AuthMode::optional("default"), AuthRequest::new(&headers, "/"))
        .await?;
    let credentials = decision.into_credentials().expect("allowed");
    assert_eq!(credentials.get_str("username"), Some("Jayant"));
    Ok(())
}

#[tokio::test]
async fn misconfigured_routes_fail_at_plan_time() {
    let engine = engine(None);

    assert_eq!(
        engine.plan(&AuthMode::required("default")).unwrap_err(),
        AuthError::NoDefaultStrategyConfigured
    );
    assert_eq!(
        engine.plan(&AuthMode::optional("missing")).unwrap_err(),
        AuthError::UnknownStrategyName("missing".to_string())
    );

    let routes = [AuthMode::Disabled, AuthMode::required("login-basic"), AuthMode::required("nope")];
    assert!(engine.validate_routes(&routes).is_err());
    assert!(engine.validate_routes(&routes[..2]).is_ok());
}

/// Flags that validation started, then waits for a release that never comes.
struct StalledValidator {
    started: Arc<AtomicBool>,
    release: Arc<Notify>,
}

#[async_trait]
impl SessionValidator for StalledValidator {
    async fn validate(&self, _session: &SessionPayload) -> anyhow::Result<Validation> {
        self.started.store(true, Ordering::SeqCst);
        self.release.notified().await;
        Ok(Validation::accepted())
    }
}

#[tokio::test]
async fn cancelled_validation_has_no_side_effects() -> Result<()> {
    let started = Arc::new(AtomicBool::new(false));
    let validator = Arc::new(StalledValidator {
        started: started.clone(),
        release: Arc::new(Notify::new()),
    });
    let options = CookieOptions {
        redirect_to: Some("/".to_string()),
        secure: false,
        ..CookieOptions::default()
    };
    let scheme = CookieScheme::with_options(SECRET, validator, options)?;

    let mut payload = SessionPayload::new();
    payload.insert("username".to_string(), "Jayant".to_string());
    let session = format!("session={}", scheme.issue(payload)?.value());

    let mut registry = AuthRegistry::new();
    registry.register_default(Strategy::cookie("login-cookie", scheme))?;
    let engine = Arc::new(DecisionEngine::new(Arc::new(registry)));
    let guard = RouteGuard::new(engine, AuthMode::Inherit)?;

    let handler_ran = Arc::new(AtomicBool::new(false));
    let ran = handler_ran.clone();
    let app = Router::new()
        .route(
            "/welcome",
            get(move || {
                let ran = ran.clone();
                async move {
                    ran.store(true, Ordering::SeqCst);
                    "welcome"
                }
            }),
        )
        .route_layer(from_fn_with_state(guard, enforce));

    let request = Request::builder()
        .uri("/welcome")
        .header(COOKIE, session)
        .body(Body::empty())?;
    let result = timeout(Duration::from_millis(200), app.clone().oneshot(request)).await;

    assert!(result.is_err(), "request finished while validation was stalled");
    assert!(started.load(Ordering::SeqCst), "validator never ran");
    assert!(!handler_ran.load(Ordering::SeqCst));

    // The abandoned request left nothing behind: a cookieless request is
    // redirected without any Set-Cookie.
    let request = Request::builder().uri("/welcome").body(Body::empty())?;
    let response = app.oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(response.headers().get(SET_COOKIE).is_none());
    assert!(!handler_ran.load(Ordering::SeqCst));

    Ok(())
}
