use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::config::Permission;
use crate::transfer::{self, ExportReport, ImportReport};
use crate::web::api::error::{ApiResult, ErrorResponse};
use crate::web::auth::{require_permission, AppState, AuthenticatedUser};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ExportQuery {
    /// Rewrite closed days that already have a file.
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ImportQuery {
    /// Clear stored points within each file's time span before inserting.
    #[serde(rename = "override", default = "default_override")]
    pub override_existing: bool,
}

fn default_override() -> bool {
    true
}

#[utoipa::path(
    post,
    path = "/api/transfer/export",
    params(ExportQuery),
    security(
        ("api_key" = [])
    ),
    responses(
        (status = 200, description = "Daily CSV files written", body = ExportReport),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 500, description = "Export failed", body = ErrorResponse)
    ),
    tag = "transfer"
)]
pub async fn export(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ExportQuery>,
) -> ApiResult<Json<ExportReport>> {
    require_permission(&user, Permission::Transfer)?;
    log::info!("{} requested export (force: {})", user.name, query.force);

    let storage = state.storage.clone();
    let root = state.config.storage.data_root.clone();
    let calendar = state.config.export.calendar;

    let report = tokio::task::spawn_blocking(move || {
        transfer::export_with_calendar(&storage, &root, calendar, Utc::now(), query.force)
    })
    .await??;

    Ok(Json(report))
}

#[utoipa::path(
    post,
    path = "/api/transfer/import",
    params(ImportQuery),
    security(
        ("api_key" = [])
    ),
    responses(
        (status = 200, description = "Per-file import results", body = ImportReport),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 500, description = "Import folder unusable", body = ErrorResponse)
    ),
    tag = "transfer"
)]
pub async fn import(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ImportQuery>,
) -> ApiResult<Json<ImportReport>> {
    require_permission(&user, Permission::Transfer)?;
    log::info!(
        "{} requested import (override: {})",
        user.name,
        query.override_existing
    );

    let storage = state.storage.clone();
    let root = state.config.storage.data_root.clone();
    let notifications = state.notifications.clone();

    let report = tokio::task::spawn_blocking(move || {
        transfer::import_all(&storage, &root, &notifications, query.override_existing)
    })
    .await??;

    Ok(Json(report))
}
