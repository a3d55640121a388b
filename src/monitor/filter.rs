use std::time::Duration;

use serde::Deserialize;

use crate::config::deserialize_duration;
use crate::location::geo::haversine_distance_m;
use crate::location::{LocationSample, TrackPoint};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    #[serde(deserialize_with = "deserialize_duration")]
    pub min_interval: Duration,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_secs(10),
        }
    }
}

/// Decides which samples become track points.
///
/// A sample is kept when at least `min_interval` has passed since the last
/// kept point and it either moved at least the two accuracy radii
/// combined, or it is strictly more precise than the last kept point.
/// Accuracies are taken as-is, including negative "unknown" values.
pub struct AcceptanceFilter {
    settings: FilterSettings,
    last_accepted: Option<LocationSample>,
}

impl AcceptanceFilter {
    pub fn new(settings: FilterSettings) -> Self {
        Self {
            settings,
            last_accepted: None,
        }
    }

    pub fn last_accepted(&self) -> Option<&LocationSample> {
        self.last_accepted.as_ref()
    }

    /// Returns the point to persist, or `None` when the sample is rejected.
    pub fn evaluate(&mut self, current: &LocationSample) -> Option<TrackPoint> {
        if let Some(last) = &self.last_accepted {
            if !self.is_novel(current, last) {
                return None;
            }
        }

        log::debug!(
            "add new point {}, {}",
            current.latitude,
            current.longitude
        );
        self.last_accepted = Some(*current);
        Some(TrackPoint::from(*current))
    }

    fn is_novel(&self, current: &LocationSample, last: &LocationSample) -> bool {
        let waited =
            current.timestamp >= last.timestamp + self.settings.min_interval.as_secs_f64();
        if !waited {
            return false;
        }

        let distance = haversine_distance_m(
            current.latitude,
            current.longitude,
            last.latitude,
            last.longitude,
        );
        distance >= current.horizontal_accuracy + last.horizontal_accuracy
            || current.horizontal_accuracy < last.horizontal_accuracy
    }
}
