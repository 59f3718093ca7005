//! Request handlers for the API endpoints.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use super::AppState;
use super::types::{
    ClearDisasterQuery, DisasterRequest, ErrorResponse, HealthResponse, OutageRequest,
};
use crate::clock::UnixTime;

/// Wall-clock seconds; the only place the crate reads the ambient clock.
fn unix_now() -> UnixTime {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Liveness probe with the list of materialized cities.
///
/// `GET /api/health` → 200 + `HealthResponse` JSON
pub async fn get_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        cities: state.store.city_names(),
    })
}

/// Runs one tick for the city and returns the dashboard payload.
///
/// `GET /api/dashboard/{city}` → 200 + `DashboardData` JSON
/// Forecaster misuse → 500 + `ErrorResponse`
pub async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    Path(city): Path<String>,
) -> impl IntoResponse {
    match state.store.tick_and_read(&city, unix_now()) {
        Ok(data) => Ok(Json(data)),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )),
    }
}

/// Triggers an artificial outage on one transformer.
///
/// `POST /api/outage/{city}/{transformer}` → 200 + `ControlResult` JSON
/// (`success: false` for unknown transformers, still 200)
pub async fn post_outage(
    State(state): State<Arc<AppState>>,
    Path((city, transformer)): Path<(String, String)>,
    body: Option<Json<OutageRequest>>,
) -> impl IntoResponse {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    Json(
        state
            .store
            .trigger_outage(&city, &transformer, request.duration_minutes, unix_now()),
    )
}

/// Clears an artificial outage.
///
/// `DELETE /api/outage/{city}/{transformer}` → 200 + `ControlResult` JSON
pub async fn delete_outage(
    State(state): State<Arc<AppState>>,
    Path((city, transformer)): Path<(String, String)>,
) -> impl IntoResponse {
    Json(state.store.clear_outage(&city, &transformer))
}

/// Triggers a disaster on one transformer or city-wide.
///
/// `POST /api/disaster/{city}` → 200 + `ControlResult` JSON
pub async fn post_disaster(
    State(state): State<Arc<AppState>>,
    Path(city): Path<String>,
    Json(request): Json<DisasterRequest>,
) -> impl IntoResponse {
    Json(state.store.trigger_disaster(
        &city,
        request.kind,
        request.transformer_id.as_deref(),
        request.duration_minutes,
        request.params,
        request.notes,
        unix_now(),
    ))
}

/// Clears disasters on one transformer or city-wide.
///
/// `DELETE /api/disaster/{city}` → 200 + `ControlResult` JSON
/// `DELETE /api/disaster/{city}?transformer_id=X` → single target
pub async fn delete_disaster(
    State(state): State<Arc<AppState>>,
    Path(city): Path<String>,
    Query(query): Query<ClearDisasterQuery>,
) -> impl IntoResponse {
    Json(
        state
            .store
            .clear_disaster(&city, query.transformer_id.as_deref()),
    )
}
