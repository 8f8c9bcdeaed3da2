use axum::extract::rejection::FormRejection;
use axum::extract::State;
use axum::response::{Html, Redirect};
use axum::{Form, Json};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::app::AppState;
use crate::auth::{AuthContext, Authenticated, SessionPayload};
use crate::errors::{AppError, AppResult};

const LOGIN_FORM: &str = r#"<!doctype html>
<html>
  <body>
    <form action="/login" method="post">
      <input type="text" name="username" placeholder="username">
      <input type="password" name="password" placeholder="password">
      <button type="submit">Log in</button>
    </form>
  </body>
</html>"#;

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    message: String,
    credentials: Value,
}

pub async fn home(auth: AuthContext) -> Html<String> {
    match auth.credentials.as_ref().and_then(|c| c.get_str("username")) {
        Some(username) => Html(format!("<h1>Hello {username}</h1>")),
        None => Html(LOGIN_FORM.to_string()),
    }
}

/// Guarded by the Basic strategy; only reached with valid credentials.
pub async fn basic_login(Authenticated(credentials): Authenticated) -> Json<LoginResponse> {
    Json(LoginResponse {
        message: "Successfully logged in".to_string(),
        credentials: credentials.data,
    })
}

/// Checks the form against the credential store and, on success, issues the
/// session cookie. This is the only place a session is created.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    form: Result<Form<LoginForm>, FormRejection>,
) -> AppResult<(CookieJar, Redirect)> {
    let Form(form) = form.map_err(|err| AppError::bad_request(err.body_text()))?;
    let scheme = state.session_scheme()?;

    let Some(principal) = state.store.authenticate(&form.username, &form.password).await? else {
        tracing::info!(username = %form.username, "login rejected");
        let target = scheme.options().redirect_to.as_deref().unwrap_or("/");
        return Ok((jar, Redirect::to(target)));
    };

    let mut payload = SessionPayload::new();
    payload.insert("username".to_string(), principal.username.clone());
    let cookie = scheme.issue(payload)?;

    tracing::info!(username = %principal.username, "session issued");
    Ok((jar.add(cookie), Redirect::to("/welcome")))
}

pub async fn welcome(Authenticated(credentials): Authenticated) -> Html<String> {
    let username = credentials.get_str("username").unwrap_or("friend");
    Html(format!("<h1>Welcome, {username}</h1><a href=\"/logout\">Log out</a>"))
}

pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> AppResult<(CookieJar, Redirect)> {
    let scheme = state.session_scheme()?;
    Ok((jar.add(scheme.clear()), Redirect::to("/")))
}
