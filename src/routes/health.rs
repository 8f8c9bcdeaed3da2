use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::app::AppState;
use crate::errors::AppResult;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub strategies: Vec<String>,
    pub default_strategy: Option<String>,
}

pub async fn health(State(state): State<AppState>) -> AppResult<Json<HealthResponse>> {
    let registry = state.engine.registry();

    Ok(Json(HealthResponse {
        status: "ok",
        strategies: registry.names().into_iter().map(str::to_string).collect(),
        default_strategy: registry.default_name().map(str::to_string),
    }))
}
