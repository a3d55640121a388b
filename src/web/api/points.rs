use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::config::Permission;
use crate::location::{geo, TrackPoint};
use crate::web::api::error::{ApiError, ApiResult, ErrorResponse};
use crate::web::auth::{require_permission, AppState, AuthenticatedUser};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Coordinates {
    #[default]
    Wgs84,
    Gcj02,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RangeQuery {
    /// Epoch seconds, inclusive.
    pub start: f64,
    /// Epoch seconds, exclusive.
    pub end: f64,
    #[serde(default)]
    #[param(inline)]
    pub coords: Coordinates,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BoundsResponse {
    /// 0 when nothing is stored.
    pub min_timestamp: f64,
    pub max_timestamp: Option<f64>,
    pub count: usize,
}

#[utoipa::path(
    get,
    path = "/api/points",
    params(RangeQuery),
    security(
        ("api_key" = [])
    ),
    responses(
        (status = 200, description = "Points in [start, end), oldest first", body = Vec<TrackPoint>),
        (status = 400, description = "Invalid range", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    tag = "points"
)]
pub async fn range(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<RangeQuery>,
) -> ApiResult<Json<Vec<TrackPoint>>> {
    require_permission(&user, Permission::Query)?;

    if !query.start.is_finite() || !query.end.is_finite() {
        return Err(ApiError::Validation("start and end must be numbers".into()));
    }

    let mut points = state.storage.points_in_range(query.start, query.end);
    if query.coords == Coordinates::Gcj02 {
        for point in &mut points {
            let (lat, lon) = geo::wgs84_to_gcj02(point.latitude, point.longitude);
            point.latitude = lat;
            point.longitude = lon;
        }
    }

    Ok(Json(points))
}

#[utoipa::path(
    get,
    path = "/api/points/bounds",
    security(
        ("api_key" = [])
    ),
    responses(
        (status = 200, description = "Oldest and newest stored timestamps", body = BoundsResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    tag = "points"
)]
pub async fn bounds(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<Json<BoundsResponse>> {
    require_permission(&user, Permission::Query)?;

    let storage = &state.storage;
    Ok(Json(BoundsResponse {
        min_timestamp: storage.min_timestamp(),
        max_timestamp: storage.max_timestamp(),
        count: storage.len(),
    }))
}
