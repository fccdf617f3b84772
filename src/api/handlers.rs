use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::collections::HashMap;

use crate::core::metrics;
use crate::core::state::AppState;
use crate::schemas::{HealthResponse, RootResponse};

pub(crate) async fn root(State(state): State<AppState>) -> Json<RootResponse> {
    let settings = state.settings();
    let response = RootResponse {
        message: settings.api().project_name.clone(),
        version: settings.api().version.clone(),
        environment: settings.runtime().environment.as_str().to_string(),
        store_backend: state.store().backend_name().to_string(),
    };

    Json(response)
}

/// Pings the backend; a failing store makes the whole service unhealthy.
pub(crate) async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    let mut status = "healthy".to_string();
    let mut components = HashMap::new();

    if let Some(credentials) = state.credentials() {
        let credential_state = credentials.state().await;
        components.insert("credentials".to_string(), credential_state.as_str().to_string());
    }

    match state.store().ping().await {
        Ok(()) => {
            components.insert("store".to_string(), "healthy".to_string());
        }
        Err(err) => {
            components.insert("store".to_string(), format!("unhealthy: {}", err.code()));
            status = "unhealthy".to_string();
        }
    }

    let code = if status == "healthy" { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (
        code,
        Json(HealthResponse {
            service: format!("homework-store/{}", state.store().backend_name()),
            status,
            components,
        }),
    )
}

pub(crate) async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    if !state.settings().telemetry().prometheus_enabled {
        return StatusCode::NOT_FOUND.into_response();
    }

    match metrics::render() {
        Some(body) => ([(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
            .into_response(),
        None => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}
