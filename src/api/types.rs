//! API request and response types.

use serde::{Deserialize, Serialize};

use crate::grid::{DisasterKind, DisasterParams};

/// Liveness probe response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub cities: Vec<String>,
}

/// Body for `POST /api/outage/{city}/{transformer}`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutageRequest {
    /// `None` keeps the outage active until cleared.
    pub duration_minutes: Option<i64>,
}

/// Body for `POST /api/disaster/{city}`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DisasterRequest {
    pub kind: DisasterKind,
    /// Target transformer; `None` hits every pole/pad in the city.
    #[serde(default)]
    pub transformer_id: Option<String>,
    #[serde(default)]
    pub duration_minutes: Option<i64>,
    #[serde(default)]
    pub params: DisasterParams,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Query for `DELETE /api/disaster/{city}`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClearDisasterQuery {
    pub transformer_id: Option<String>,
}

/// Error payload for failed requests.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
