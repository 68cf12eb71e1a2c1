//! Quadrant, CAI and code lookup endpoints
//!
//! - `GET /quadrant?lat=&lng=[&session=]`
//! - `GET /cai?code=[&lat=&lng=]`
//! - `GET /code/:code`

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use cuadrante_common::GeoPoint;
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::sessions::SessionOutcome;
use crate::siv_code::SivCode;
use crate::types::{CaiLocation, QuadrantRecord};
use crate::AppState;

/// Query parameters for quadrant lookup
#[derive(Debug, Deserialize)]
pub struct QuadrantQuery {
    pub lat: f64,
    pub lng: f64,
    /// Viewport session; a newer query with the same id supersedes this one
    pub session: Option<String>,
}

/// Query parameters for CAI lookup
#[derive(Debug, Deserialize)]
pub struct CaiQueryParams {
    pub code: String,
    /// Fallback point for proximity matching, both or neither
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

fn checked_point(lat: f64, lng: f64) -> ApiResult<GeoPoint> {
    let point = GeoPoint::new(lat, lng);
    if point.is_valid() {
        Ok(point)
    } else {
        Err(cuadrante_common::Error::InvalidInput(format!(
            "coordinate out of range: lat={}, lng={}",
            lat, lng
        ))
        .into())
    }
}

/// GET /quadrant?lat=&lng=[&session=]
///
/// Without a session the lookup runs immediately; with one it is debounced
/// and may be superseded (409).
pub async fn get_quadrant(
    State(state): State<AppState>,
    Query(query): Query<QuadrantQuery>,
) -> ApiResult<Json<QuadrantRecord>> {
    let point = checked_point(query.lat, query.lng)?;
    let locator = &state.locator;

    let record = match query.session.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(session) => {
            match state
                .sessions
                .run(session, || locator.resolve_quadrant(point))
                .await
            {
                SessionOutcome::Completed(record) => record,
                SessionOutcome::Superseded => return Err(ApiError::Superseded(session.to_string())),
            }
        }
        None => locator.resolve_quadrant(point).await,
    };

    record.map(Json).ok_or_else(|| {
        ApiError::NotFound(format!("no quadrant contains ({}, {})", point.lat, point.lng))
    })
}

/// GET /cai?code=[&lat=&lng=]
pub async fn get_cai(
    State(state): State<AppState>,
    Query(query): Query<CaiQueryParams>,
) -> ApiResult<Json<CaiLocation>> {
    let code = query.code.trim();
    if code.is_empty() {
        return Err(ApiError::BadRequest("code must not be empty".to_string()));
    }
    let fallback = match (query.lat, query.lng) {
        (Some(lat), Some(lng)) => Some(checked_point(lat, lng)?),
        (None, None) => None,
        _ => {
            return Err(ApiError::BadRequest(
                "lat and lng must be given together".to_string(),
            ))
        }
    };

    state
        .locator
        .resolve_cai(code, fallback)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no CAI located for {}", code)))
}

/// GET /code/:code
pub async fn get_code(Path(code): Path<String>) -> ApiResult<Json<SivCode>> {
    SivCode::parse(&code)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("unrecognized quadrant code: {}", code)))
}

/// Build lookup routes
pub fn quadrant_routes() -> Router<AppState> {
    Router::new()
        .route("/quadrant", get(get_quadrant))
        .route("/cai", get(get_cai))
        .route("/code/:code", get(get_code))
}
