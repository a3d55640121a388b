use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum SensorError {
    #[error("location services unavailable: {0}")]
    Unavailable(String),
    #[error("location permission denied")]
    PermissionDenied,
    #[error("invalid distance filter: {0}m")]
    InvalidDistanceFilter(f64),
}
