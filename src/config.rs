use std::path::PathBuf;

use crate::errors::AppError;

pub const MIN_SECRET_LENGTH: usize = 32;

/// Process configuration read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub session_secret: String,
    pub cookie_name: String,
    pub cookie_secure: bool,
    pub session_ttl_hours: Option<i64>,
    pub login_redirect: String,
    pub principals_file: Option<PathBuf>,
    pub port: u16,
}

impl AuthSettings {
    pub fn from_env() -> Result<Self, AppError> {
        let session_secret = std::env::var("SESSION_SECRET")
            .map_err(|_| AppError::configuration("SESSION_SECRET not set"))?;
        if session_secret.len() < MIN_SECRET_LENGTH {
            return Err(AppError::configuration(format!(
                "SESSION_SECRET must be at least {MIN_SECRET_LENGTH} bytes"
            )));
        }

        let cookie_secure = std::env::var("SESSION_SECURE")
            .map(|val| val.parse::<bool>())
            .unwrap_or(Ok(false))
            .map_err(|_| AppError::configuration("SESSION_SECURE must be true or false"))?;

        let session_ttl_hours = std::env::var("SESSION_TTL_HOURS")
            .ok()
            .map(|val| val.parse::<i64>())
            .transpose()
            .map_err(|_| AppError::configuration("SESSION_TTL_HOURS must be a valid integer"))?;

        let port = std::env::var("APP_PORT")
            .map(|val| val.parse::<u16>())
            .unwrap_or(Ok(8000))
            .map_err(|_| AppError::configuration("APP_PORT must be a valid port"))?;

        Ok(Self {
            session_secret,
            cookie_name: std::env::var("SESSION_COOKIE").unwrap_or_else(|_| "session".to_string()),
            cookie_secure,
            session_ttl_hours,
            login_redirect: std::env::var("LOGIN_REDIRECT").unwrap_or_else(|_| "/".to_string()),
            principals_file: std::env::var("PRINCIPALS_FILE").ok().map(PathBuf::from),
            port,
        })
    }

    /// Settings for tests and local tooling.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            session_secret: secret.into(),
            cookie_name: "session".to_string(),
            cookie_secure: false,
            session_ttl_hours: None,
            login_redirect: "/".to_string(),
            principals_file: None,
            port: 8000,
        }
    }
}
