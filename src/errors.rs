use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

pub type AppResult<T> = Result<T, AppError>;

/// Authentication failures.
///
/// Per-request variants never cross the decision engine boundary: they are
/// folded into a deny or redirect outcome. Only the startup variants
/// (`NoDefaultStrategyConfigured`, `UnknownStrategyName`, `DuplicateStrategy`,
/// `InvalidStrategyConfig`) are returned to callers as errors.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("malformed authorization header")]
    MalformedHeader,
    #[error("session cookie missing")]
    MissingCookie,
    #[error("session cookie failed verification")]
    InvalidSignature,
    #[error("session expired")]
    SessionExpired,
    #[error("credentials rejected by validator")]
    ValidatorRejected,
    #[error("validator failed: {0}")]
    ValidatorFailed(String),
    #[error("session could not be encoded: {0}")]
    SessionEncoding(String),
    #[error("no default strategy configured")]
    NoDefaultStrategyConfigured,
    #[error("unknown strategy: {0}")]
    UnknownStrategyName(String),
    #[error("strategy already registered: {0}")]
    DuplicateStrategy(String),
    #[error("invalid strategy configuration: {0}")]
    InvalidStrategyConfig(String),
}

impl AuthError {
    /// Startup-time misconfiguration, as opposed to a per-request failure.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AuthError::NoDefaultStrategyConfigured
                | AuthError::UnknownStrategyName(_)
                | AuthError::DuplicateStrategy(_)
                | AuthError::InvalidStrategyConfig(_)
        )
    }
}

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = self.to_string();
        let error = match &self {
            AppError::Unauthorized(_) => "unauthorized",
            AppError::BadRequest(_) => "bad_request",
            AppError::Configuration(_) => "configuration",
            AppError::Internal(_) => "internal",
        };

        let payload = ErrorResponse {
            error: error.to_string(),
            message,
        };

        (status, Json(payload)).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(value: AuthError) -> Self {
        match value {
            AuthError::SessionEncoding(_) => Self::Internal(value.to_string()),
            _ if value.is_fatal() => Self::Configuration(value.to_string()),
            _ => Self::Unauthorized(value.to_string()),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value.to_string())
    }
}
