use axum::{routing::get, routing::post, Router};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::Config;
use crate::monitor::{LocationMonitor, RemoteSensor};
use crate::notify::NotificationCenter;
use crate::store::{drain, PointWriter, Storage, StoreError};

use super::api::notifications as notification_handlers;
use super::api::points as point_handlers;
use super::api::sensor as sensor_handlers;
use super::api::transfer as transfer_handlers;
use super::api_doc::ApiDoc;
use super::auth::AppState;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

/// Wires the monitor to a background writer on `storage`. The returned
/// handle finishes once every clone of the state is dropped.
pub fn build_state(config: Config, storage: Arc<Storage>) -> (AppState, JoinHandle<()>) {
    let notifications =
        NotificationCenter::new(config.notifications.authorized, config.notifications.history);
    let (writer, writer_task) = PointWriter::spawn(storage.clone());

    let monitor = LocationMonitor::start(
        RemoteSensor::new(),
        Arc::new(notifications.clone()),
        config.monitor.clone(),
        config.filter.clone(),
        Box::new(writer),
    );

    let state = AppState {
        config: Arc::new(config),
        storage,
        monitor: Arc::new(Mutex::new(monitor)),
        notifications,
    };
    (state, writer_task)
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Sensor and app lifecycle events
        .route("/api/sensor/locations", post(sensor_handlers::locations))
        .route("/api/sensor/paused", post(sensor_handlers::paused))
        .route("/api/sensor/error", post(sensor_handlers::error))
        .route("/api/app/background", post(sensor_handlers::background))
        .route("/api/monitor/status", get(sensor_handlers::status))
        // Stored points
        .route("/api/points", get(point_handlers::range))
        .route("/api/points/bounds", get(point_handlers::bounds))
        // CSV transfer
        .route("/api/transfer/export", post(transfer_handlers::export))
        .route("/api/transfer/import", post(transfer_handlers::import))
        .route("/api/notifications", get(notification_handlers::list))
        // OpenAPI / Swagger
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        // Middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(config: Config) -> Result<(), ServerError> {
    let bind_addr = config.web.bind.clone();
    let storage = Arc::new(Storage::open(config.storage.path.clone())?);

    let (state, writer_task) = build_state(config, storage);
    let app = router(state);

    log::info!("Starting server on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    let served = axum::serve(listener, app).await;

    // The router owned the last writer handle; flush what is still queued.
    log::info!("Server stopped, storing queued points");
    drain(writer_task).await;
    served?;
    Ok(())
}
