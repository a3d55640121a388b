use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One raw position reading as delivered by the sensor.
///
/// `timestamp` is seconds since the Unix epoch. Accuracy fields follow the
/// platform convention where a negative value means "unknown".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LocationSample {
    pub timestamp: f64,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default = "unknown")]
    pub altitude: f64,
    #[serde(default = "unknown")]
    pub speed: f64,
    #[serde(default = "unknown")]
    pub speed_accuracy: f64,
    #[serde(default = "unknown")]
    pub course: f64,
    #[serde(default = "unknown")]
    pub horizontal_accuracy: f64,
    #[serde(default = "unknown")]
    pub vertical_accuracy: f64,
}

fn unknown() -> f64 {
    -1.0
}

impl LocationSample {
    /// A fix with only a position; every other field is unknown (`-1`).
    pub fn at(timestamp: f64, latitude: f64, longitude: f64) -> Self {
        Self {
            timestamp,
            latitude,
            longitude,
            altitude: unknown(),
            speed: unknown(),
            speed_accuracy: unknown(),
            course: unknown(),
            horizontal_accuracy: unknown(),
            vertical_accuracy: unknown(),
        }
    }
}

/// A sample that passed the acceptance filter and was persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrackPoint {
    pub timestamp: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub speed: f64,
    pub speed_accuracy: f64,
    pub course: f64,
    pub horizontal_accuracy: f64,
    pub vertical_accuracy: f64,
}

impl From<LocationSample> for TrackPoint {
    fn from(s: LocationSample) -> Self {
        TrackPoint {
            timestamp: s.timestamp,
            latitude: s.latitude,
            longitude: s.longitude,
            altitude: s.altitude,
            speed: s.speed,
            speed_accuracy: s.speed_accuracy,
            course: s.course,
            horizontal_accuracy: s.horizontal_accuracy,
            vertical_accuracy: s.vertical_accuracy,
        }
    }
}

impl From<TrackPoint> for LocationSample {
    fn from(p: TrackPoint) -> Self {
        LocationSample {
            timestamp: p.timestamp,
            latitude: p.latitude,
            longitude: p.longitude,
            altitude: p.altitude,
            speed: p.speed,
            speed_accuracy: p.speed_accuracy,
            course: p.course,
            horizontal_accuracy: p.horizontal_accuracy,
            vertical_accuracy: p.vertical_accuracy,
        }
    }
}

impl TrackPoint {
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        to_datetime(self.timestamp)
    }
}

/// Converts fractional epoch seconds into a UTC datetime.
pub fn to_datetime(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9).round().min(999_999_999.0) as u32;
    Utc.timestamp_opt(whole as i64, nanos).single()
}

pub fn to_seconds<Tz: TimeZone>(dt: &DateTime<Tz>) -> f64 {
    dt.timestamp() as f64 + f64::from(dt.timestamp_subsec_nanos()) / 1e9
}
