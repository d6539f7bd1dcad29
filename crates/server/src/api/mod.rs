//! HTTP surface of the events service.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use server_api::{add_event, list_events};
use shared::{
    domain::EventRecord,
    error::ApiError,
    protocol::{EVENTS_ROUTE, HEALTHZ_ROUTE},
};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::app_state::AppState;

const MAX_EVENT_BODY_BYTES: usize = 64 * 1024;

type HttpError = (StatusCode, String);

pub(crate) fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(HEALTHZ_ROUTE, get(healthz))
        .route(EVENTS_ROUTE, get(http_list_events).post(http_add_event))
        .layer(RequestBodyLimitLayer::new(MAX_EVENT_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz(State(state): State<Arc<AppState>>) -> Result<&'static str, HttpError> {
    state.api.storage.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "health check failed");
        (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
    })?;
    Ok("ok")
}

async fn http_list_events(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<EventRecord>>, HttpError> {
    let events = list_events(&state.api, Utc::now())
        .await
        .map_err(error_response)?;
    Ok(Json(events))
}

async fn http_add_event(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<StatusCode, HttpError> {
    let event_id = add_event(&state.api, &body)
        .await
        .map_err(error_response)?;
    tracing::info!(event_id, "event created");
    Ok(StatusCode::CREATED)
}

fn error_response(err: ApiError) -> HttpError {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        tracing::error!(status = status.as_u16(), error = %err, "request failed");
    }
    (status, err.message)
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
