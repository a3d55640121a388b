use serde::Serialize;
use utoipa::ToSchema;

use crate::location::LocationSample;
use crate::monitor::SensorError;

/// Precision/power bundle requested from the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AccuracyClass {
    Best,
    NearestTenMeters,
    SignificantChange,
}

/// Inputs delivered by the sensor subsystem, in arrival order.
#[derive(Debug, Clone)]
pub enum SensorEvent {
    SampleArrived(LocationSample),
    /// The sensor auto-paused updates after a long stretch without motion.
    Paused,
    Failed(SensorError),
}

pub trait LocationSensor: Send {
    fn configure(
        &mut self,
        accuracy: AccuracyClass,
        distance_filter_m: f64,
        auto_pause: bool,
    ) -> Result<(), SensorError>;
    fn start_high_frequency_updates(&mut self) -> Result<(), SensorError>;
    fn start_significant_change_updates(&mut self) -> Result<(), SensorError>;
    fn stop_updates(&mut self) -> Result<(), SensorError>;
}

/// Sensor configuration as last applied.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SensorSettings {
    pub accuracy: Option<AccuracyClass>,
    pub distance_filter_m: f64,
    pub auto_pause: bool,
    pub updating: Option<UpdateStream>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStream {
    HighFrequency,
    SignificantChange,
}

/// Sensor backend for hosts that push fixes in from outside (HTTP, replay).
/// It only records and logs what the controller asks for.
#[derive(Debug)]
pub struct RemoteSensor {
    settings: SensorSettings,
}

impl Default for RemoteSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteSensor {
    pub fn new() -> Self {
        Self {
            settings: SensorSettings {
                accuracy: None,
                distance_filter_m: 0.0,
                auto_pause: false,
                updating: None,
            },
        }
    }

    pub fn settings(&self) -> &SensorSettings {
        &self.settings
    }
}

impl LocationSensor for RemoteSensor {
    fn configure(
        &mut self,
        accuracy: AccuracyClass,
        distance_filter_m: f64,
        auto_pause: bool,
    ) -> Result<(), SensorError> {
        if !distance_filter_m.is_finite() || distance_filter_m < 0.0 {
            return Err(SensorError::InvalidDistanceFilter(distance_filter_m));
        }
        log::debug!(
            "sensor configured: {:?}, filter {}m, auto pause {}",
            accuracy,
            distance_filter_m,
            auto_pause
        );
        self.settings.accuracy = Some(accuracy);
        self.settings.distance_filter_m = distance_filter_m;
        self.settings.auto_pause = auto_pause;
        Ok(())
    }

    fn start_high_frequency_updates(&mut self) -> Result<(), SensorError> {
        self.settings.updating = Some(UpdateStream::HighFrequency);
        Ok(())
    }

    fn start_significant_change_updates(&mut self) -> Result<(), SensorError> {
        self.settings.updating = Some(UpdateStream::SignificantChange);
        Ok(())
    }

    fn stop_updates(&mut self) -> Result<(), SensorError> {
        self.settings.updating = None;
        Ok(())
    }
}

#[cfg(test)]
pub mod testing {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub enum SensorCall {
        Configure(AccuracyClass, f64, bool),
        StartHighFrequency,
        StartSignificantChange,
        Stop,
    }

    /// Records every call; optionally fails `configure`.
    #[derive(Clone, Default)]
    pub struct ScriptedSensor {
        pub calls: Arc<Mutex<Vec<SensorCall>>>,
        pub fail_configure: Arc<Mutex<bool>>,
    }

    impl ScriptedSensor {
        pub fn take_calls(&self) -> Vec<SensorCall> {
            std::mem::take(&mut *self.calls.lock().unwrap())
        }

        pub fn set_failing(&self, failing: bool) {
            *self.fail_configure.lock().unwrap() = failing;
        }
    }

    impl LocationSensor for ScriptedSensor {
        fn configure(
            &mut self,
            accuracy: AccuracyClass,
            distance_filter_m: f64,
            auto_pause: bool,
        ) -> Result<(), SensorError> {
            if *self.fail_configure.lock().unwrap() {
                return Err(SensorError::Unavailable("scripted failure".into()));
            }
            self.calls.lock().unwrap().push(SensorCall::Configure(
                accuracy,
                distance_filter_m,
                auto_pause,
            ));
            Ok(())
        }

        fn start_high_frequency_updates(&mut self) -> Result<(), SensorError> {
            self.calls.lock().unwrap().push(SensorCall::StartHighFrequency);
            Ok(())
        }

        fn start_significant_change_updates(&mut self) -> Result<(), SensorError> {
            self.calls
                .lock()
                .unwrap()
                .push(SensorCall::StartSignificantChange);
            Ok(())
        }

        fn stop_updates(&mut self) -> Result<(), SensorError> {
            self.calls.lock().unwrap().push(SensorCall::Stop);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_sensor_tracks_applied_settings() {
        let mut sensor = RemoteSensor::new();
        sensor
            .configure(AccuracyClass::NearestTenMeters, 25.0, true)
            .unwrap();
        sensor.start_high_frequency_updates().unwrap();

        let settings = sensor.settings();
        assert_eq!(settings.accuracy, Some(AccuracyClass::NearestTenMeters));
        assert_eq!(settings.distance_filter_m, 25.0);
        assert!(settings.auto_pause);
        assert_eq!(settings.updating, Some(UpdateStream::HighFrequency));

        sensor.stop_updates().unwrap();
        assert_eq!(sensor.settings().updating, None);
    }

    #[test]
    fn remote_sensor_rejects_negative_filter() {
        let mut sensor = RemoteSensor::new();
        let err = sensor
            .configure(AccuracyClass::NearestTenMeters, -5.0, true)
            .unwrap_err();
        assert!(matches!(err, SensorError::InvalidDistanceFilter(_)));
        assert_eq!(sensor.settings().accuracy, None);
    }
}
