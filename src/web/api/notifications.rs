use axum::{extract::State, Json};

use crate::config::Permission;
use crate::notify::Notification;
use crate::web::api::error::{ApiResult, ErrorResponse};
use crate::web::auth::{require_permission, AppState, AuthenticatedUser};

#[utoipa::path(
    get,
    path = "/api/notifications",
    security(
        ("api_key" = [])
    ),
    responses(
        (status = 200, description = "Recent notifications, newest first", body = Vec<Notification>),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    tag = "notifications"
)]
pub async fn list(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<Json<Vec<Notification>>> {
    require_permission(&user, Permission::Query)?;
    Ok(Json(state.notifications.recent()))
}
