use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};

use super::api::error::ErrorResponse;
use super::api::{notifications, points, sensor, transfer};

#[derive(OpenApi)]
#[openapi(
    paths(
        sensor::locations,
        sensor::paused,
        sensor::error,
        sensor::background,
        sensor::status,
        points::range,
        points::bounds,
        transfer::export,
        transfer::import,
        notifications::list,
    ),
    components(
        schemas(
            ErrorResponse,
            sensor::StatusResponse,
            sensor::SensorErrorRequest,
            points::BoundsResponse,
            points::Coordinates,
            crate::location::LocationSample,
            crate::location::TrackPoint,
            crate::monitor::MonitorStatus,
            crate::monitor::AccuracyMode,
            crate::monitor::SensorSettings,
            crate::transfer::ExportReport,
            crate::transfer::ImportReport,
            crate::notify::Notification,
        )
    ),
    modifiers(&SecurityAddon),
    info(
        title = "Locus API",
        description = "Location sampling, track storage and CSV transfer",
        version = "0.1.0"
    ),
    tags(
        (name = "sensor", description = "Sensor events and monitor state"),
        (name = "points", description = "Stored track points"),
        (name = "transfer", description = "Daily CSV export and import"),
        (name = "notifications", description = "Delivered notifications")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}
