use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::Permission;
use crate::location::LocationSample;
use crate::monitor::{MonitorStatus, SensorError, SensorEvent, SensorSettings};
use crate::web::api::error::{ApiError, ApiResult, ErrorResponse};
use crate::web::auth::{require_permission, AppState, AuthenticatedUser};

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponse {
    pub monitor: MonitorStatus,
    pub sensor: SensorSettings,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SensorErrorRequest {
    pub message: String,
    /// The user revoked location access.
    #[serde(default)]
    pub denied: bool,
}

#[utoipa::path(
    post,
    path = "/api/sensor/locations",
    request_body = Vec<LocationSample>,
    security(
        ("api_key" = [])
    ),
    responses(
        (status = 200, description = "Fixes delivered, most recent one evaluated", body = StatusResponse),
        (status = 400, description = "Empty batch", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    tag = "sensor"
)]
pub async fn locations(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(batch): Json<Vec<LocationSample>>,
) -> ApiResult<Json<StatusResponse>> {
    require_permission(&user, Permission::Ingest)?;

    let mut monitor = state.monitor.lock().await;
    if !monitor.deliver(&batch) {
        return Err(ApiError::Validation("no locations in batch".into()));
    }

    Ok(Json(StatusResponse {
        monitor: monitor.status(),
        sensor: monitor.sensor().settings().clone(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/sensor/paused",
    security(
        ("api_key" = [])
    ),
    responses(
        (status = 200, description = "Pause handled", body = StatusResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    tag = "sensor"
)]
pub async fn paused(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<Json<StatusResponse>> {
    require_permission(&user, Permission::Ingest)?;

    let mut monitor = state.monitor.lock().await;
    monitor.handle(SensorEvent::Paused);

    Ok(Json(StatusResponse {
        monitor: monitor.status(),
        sensor: monitor.sensor().settings().clone(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/sensor/error",
    request_body = SensorErrorRequest,
    security(
        ("api_key" = [])
    ),
    responses(
        (status = 204, description = "Error recorded"),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    tag = "sensor"
)]
pub async fn error(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<SensorErrorRequest>,
) -> ApiResult<axum::http::StatusCode> {
    require_permission(&user, Permission::Ingest)?;

    let error = if request.denied {
        SensorError::PermissionDenied
    } else {
        SensorError::Unavailable(request.message)
    };
    state.monitor.lock().await.handle(SensorEvent::Failed(error));

    Ok(axum::http::StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/app/background",
    security(
        ("api_key" = [])
    ),
    responses(
        (status = 204, description = "Background transition recorded"),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    tag = "sensor"
)]
pub async fn background(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<axum::http::StatusCode> {
    require_permission(&user, Permission::Ingest)?;
    state.monitor.lock().await.enter_background();
    Ok(axum::http::StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/monitor/status",
    security(
        ("api_key" = [])
    ),
    responses(
        (status = 200, description = "Monitor status", body = StatusResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    tag = "sensor"
)]
pub async fn status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<Json<StatusResponse>> {
    require_permission(&user, Permission::Query)?;

    let monitor = state.monitor.lock().await;
    Ok(Json(StatusResponse {
        monitor: monitor.status(),
        sensor: monitor.sensor().settings().clone(),
    }))
}
