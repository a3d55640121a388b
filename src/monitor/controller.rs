use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::deserialize_duration;
use crate::location::LocationSample;
use crate::monitor::sensor::{AccuracyClass, LocationSensor};
use crate::monitor::SensorError;
use crate::notify::Notifier;

const MODE_CHANGED_TITLE: &str = "Monitor accuracy changed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AccuracyMode {
    HighAccuracy,
    LowAccuracy,
}

/// User preference for high-accuracy mode: `best`, or a distance filter in meters.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "RawAccuracy")]
pub enum AccuracyPreference {
    Best,
    Meters(f64),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAccuracy {
    Keyword(String),
    Meters(f64),
}

impl TryFrom<RawAccuracy> for AccuracyPreference {
    type Error = String;

    fn try_from(raw: RawAccuracy) -> Result<Self, Self::Error> {
        match raw {
            RawAccuracy::Keyword(k) if k == "best" => Ok(AccuracyPreference::Best),
            RawAccuracy::Keyword(k) => k
                .trim()
                .parse::<f64>()
                .map(AccuracyPreference::Meters)
                .map_err(|_| format!("unknown accuracy preference: {}", k)),
            RawAccuracy::Meters(m) => Ok(AccuracyPreference::Meters(m)),
        }
    }
}

impl Default for AccuracyPreference {
    fn default() -> Self {
        AccuracyPreference::Meters(0.0)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    pub accuracy: AccuracyPreference,
    /// Samples slower than this count as stationary.
    pub stationary_speed: f64,
    /// Speed accuracy must be known and below this for the speed to be trusted.
    pub stationary_speed_accuracy: f64,
    #[serde(deserialize_with = "deserialize_duration")]
    pub stationary_dwell: Duration,
    pub significant_change_distance_m: f64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            accuracy: AccuracyPreference::default(),
            stationary_speed: 1.0,
            stationary_speed_accuracy: 10.0,
            stationary_dwell: Duration::from_secs(60),
            significant_change_distance_m: 500.0,
        }
    }
}

/// Two-state power policy for the location sensor.
///
/// Runs the sensor at fine accuracy while moving and drops to
/// significant-change monitoring once the device has been stationary for
/// `stationary_dwell`, or when the sensor reports that it paused itself.
/// Any fix delivered in low-accuracy mode promotes back to high accuracy.
pub struct AccuracyController<S> {
    sensor: S,
    notifier: Arc<dyn Notifier>,
    settings: MonitorSettings,
    high_accuracy_active: bool,
    /// Some update stream has been started successfully.
    streaming: bool,
    stationary_anchor: Option<LocationSample>,
}

impl<S: LocationSensor> AccuracyController<S> {
    pub fn new(sensor: S, notifier: Arc<dyn Notifier>, settings: MonitorSettings) -> Self {
        Self {
            sensor,
            notifier,
            settings,
            high_accuracy_active: false,
            streaming: false,
            stationary_anchor: None,
        }
    }

    /// Enters the initial high-accuracy state.
    pub fn start(&mut self) {
        self.enter_high_accuracy();
    }

    pub fn mode(&self) -> AccuracyMode {
        if self.high_accuracy_active {
            AccuracyMode::HighAccuracy
        } else {
            AccuracyMode::LowAccuracy
        }
    }

    pub fn stationary_anchor(&self) -> Option<&LocationSample> {
        self.stationary_anchor.as_ref()
    }

    pub fn sensor(&self) -> &S {
        &self.sensor
    }

    pub fn on_paused(&mut self) {
        log::info!("sensor paused location updates");
        self.enter_low_accuracy();
    }

    pub fn observe(&mut self, sample: &LocationSample) {
        if !self.high_accuracy_active {
            self.enter_high_accuracy();
        }

        if !self.is_stationary(sample) {
            self.stationary_anchor = None;
            return;
        }

        match self.stationary_anchor {
            None => self.stationary_anchor = Some(*sample),
            Some(anchor) => {
                let dwell = sample.timestamp - anchor.timestamp;
                if dwell >= self.settings.stationary_dwell.as_secs_f64() {
                    log::debug!("stationary for {:.1}s", dwell);
                    self.enter_low_accuracy();
                }
            }
        }
    }

    fn is_stationary(&self, sample: &LocationSample) -> bool {
        sample.speed < self.settings.stationary_speed
            && sample.speed_accuracy >= 0.0
            && sample.speed_accuracy < self.settings.stationary_speed_accuracy
    }

    fn enter_high_accuracy(&mut self) {
        if self.high_accuracy_active {
            return;
        }

        let (accuracy, distance_filter, body) = match self.settings.accuracy {
            AccuracyPreference::Best => (AccuracyClass::Best, 0.0, "High best".to_string()),
            AccuracyPreference::Meters(m) => {
                (AccuracyClass::NearestTenMeters, m, format!("High {}m", m))
            }
        };

        if let Err(e) = self.apply_high_accuracy(accuracy, distance_filter) {
            log::error!("failed to start high accuracy monitor: {}", e);
            return;
        }

        self.high_accuracy_active = true;
        self.streaming = true;
        log::info!("start high accuracy monitor");
        self.notifier.notify(MODE_CHANGED_TITLE, &body);
    }

    fn enter_low_accuracy(&mut self) {
        if !self.high_accuracy_active {
            return;
        }

        if let Err(e) = self.apply_low_accuracy() {
            log::error!("failed to start low accuracy monitor: {}", e);
            return;
        }

        self.high_accuracy_active = false;
        self.streaming = true;
        log::info!("start low accuracy monitor");
        self.notifier.notify(MODE_CHANGED_TITLE, "Low");
    }

    /// Configuration is applied before the running stream is touched, so a
    /// rejected configuration leaves the current stream untouched.
    fn apply_high_accuracy(
        &mut self,
        accuracy: AccuracyClass,
        distance_filter: f64,
    ) -> Result<(), SensorError> {
        self.sensor.configure(accuracy, distance_filter, true)?;
        self.sensor.stop_updates()?;
        self.sensor
            .start_high_frequency_updates()
            .inspect_err(|_| self.resume_current_stream())
    }

    fn apply_low_accuracy(&mut self) -> Result<(), SensorError> {
        self.sensor.configure(
            AccuracyClass::SignificantChange,
            self.settings.significant_change_distance_m,
            false,
        )?;
        self.sensor.stop_updates()?;
        self.sensor
            .start_significant_change_updates()
            .inspect_err(|_| self.resume_current_stream())
    }

    fn resume_current_stream(&mut self) {
        if !self.streaming {
            return;
        }
        let resumed = if self.high_accuracy_active {
            self.sensor.start_high_frequency_updates()
        } else {
            self.sensor.start_significant_change_updates()
        };
        if let Err(e) = resumed {
            log::error!("failed to resume location updates: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::sensor::testing::{ScriptedSensor, SensorCall};
    use crate::notify::testing::RecordingNotifier;

    fn still(t: f64) -> LocationSample {
        LocationSample {
            speed: 0.0,
            speed_accuracy: 1.0,
            ..LocationSample::at(t, 37.38, -122.02)
        }
    }

    fn moving(t: f64) -> LocationSample {
        LocationSample {
            speed: 3.0,
            speed_accuracy: 1.0,
            ..LocationSample::at(t, 37.38, -122.02)
        }
    }

    fn started(
        settings: MonitorSettings,
    ) -> (
        AccuracyController<ScriptedSensor>,
        ScriptedSensor,
        RecordingNotifier,
    ) {
        let sensor = ScriptedSensor::default();
        let notifier = RecordingNotifier::default();
        let mut controller =
            AccuracyController::new(sensor.clone(), Arc::new(notifier.clone()), settings);
        controller.start();
        (controller, sensor, notifier)
    }

    #[test]
    fn start_enters_high_accuracy_with_distance_filter() {
        let settings = MonitorSettings {
            accuracy: AccuracyPreference::Meters(25.0),
            ..MonitorSettings::default()
        };
        let (controller, sensor, notifier) = started(settings);

        assert_eq!(controller.mode(), AccuracyMode::HighAccuracy);
        assert_eq!(
            sensor.take_calls(),
            vec![
                SensorCall::Configure(AccuracyClass::NearestTenMeters, 25.0, true),
                SensorCall::Stop,
                SensorCall::StartHighFrequency,
            ]
        );
        assert_eq!(
            notifier.take(),
            vec![(MODE_CHANGED_TITLE.to_string(), "High 25m".to_string())]
        );
    }

    #[test]
    fn best_preference_uses_zero_distance_filter() {
        let settings = MonitorSettings {
            accuracy: AccuracyPreference::Best,
            ..MonitorSettings::default()
        };
        let (_controller, sensor, notifier) = started(settings);

        assert!(sensor
            .take_calls()
            .contains(&SensorCall::Configure(AccuracyClass::Best, 0.0, true)));
        assert_eq!(notifier.take()[0].1, "High best");
    }

    #[test]
    fn downgrades_exactly_when_stationary_run_reaches_dwell() {
        let (mut controller, sensor, notifier) = started(MonitorSettings::default());
        sensor.take_calls();
        notifier.take();

        for t in [100.0, 110.0, 120.0, 130.0, 140.0, 150.0, 159.9] {
            controller.observe(&still(t));
            assert_eq!(controller.mode(), AccuracyMode::HighAccuracy, "at t={t}");
        }
        assert_eq!(controller.stationary_anchor().unwrap().timestamp, 100.0);

        controller.observe(&still(160.0));
        assert_eq!(controller.mode(), AccuracyMode::LowAccuracy);
        assert_eq!(
            sensor.take_calls(),
            vec![
                SensorCall::Configure(AccuracyClass::SignificantChange, 500.0, false),
                SensorCall::Stop,
                SensorCall::StartSignificantChange,
            ]
        );
        assert_eq!(
            notifier.take(),
            vec![(MODE_CHANGED_TITLE.to_string(), "Low".to_string())]
        );
    }

    #[test]
    fn stationary_fix_after_downgrade_bounces_back_to_low() {
        let (mut controller, _sensor, notifier) = started(MonitorSettings::default());
        controller.observe(&still(0.0));
        controller.observe(&still(60.0));
        assert_eq!(controller.mode(), AccuracyMode::LowAccuracy);
        notifier.take();

        // The anchor survives the downgrade, so the dwell is already met.
        controller.observe(&still(300.0));
        assert_eq!(controller.mode(), AccuracyMode::LowAccuracy);
        let bodies: Vec<_> = notifier.take().into_iter().map(|(_, b)| b).collect();
        assert_eq!(bodies, vec!["High 0m", "Low"]);
    }

    #[test]
    fn motion_clears_anchor_and_restarts_clock() {
        let (mut controller, _sensor, _notifier) = started(MonitorSettings::default());

        controller.observe(&still(0.0));
        controller.observe(&still(50.0));
        controller.observe(&moving(55.0));
        assert!(controller.stationary_anchor().is_none());

        controller.observe(&still(70.0));
        controller.observe(&still(100.0));
        assert_eq!(controller.mode(), AccuracyMode::HighAccuracy);
        assert_eq!(controller.stationary_anchor().unwrap().timestamp, 70.0);

        controller.observe(&still(130.0));
        assert_eq!(controller.mode(), AccuracyMode::LowAccuracy);
    }

    #[test]
    fn unknown_or_poor_speed_accuracy_is_not_stationary() {
        let (mut controller, _sensor, _notifier) = started(MonitorSettings::default());

        controller.observe(&still(0.0));
        let untrusted = LocationSample {
            speed_accuracy: -1.0,
            ..still(30.0)
        };
        controller.observe(&untrusted);
        assert!(controller.stationary_anchor().is_none());

        controller.observe(&still(40.0));
        let noisy = LocationSample {
            speed_accuracy: 10.0,
            ..still(45.0)
        };
        controller.observe(&noisy);
        assert!(controller.stationary_anchor().is_none());
    }

    #[test]
    fn speed_threshold_is_exclusive() {
        let (mut controller, _sensor, _notifier) = started(MonitorSettings::default());
        let at_threshold = LocationSample {
            speed: 1.0,
            ..still(0.0)
        };
        controller.observe(&at_threshold);
        assert!(controller.stationary_anchor().is_none());

        let just_below = LocationSample {
            speed: 0.999,
            ..still(5.0)
        };
        controller.observe(&just_below);
        assert_eq!(controller.stationary_anchor().unwrap().timestamp, 5.0);
    }

    #[test]
    fn zero_speed_accuracy_is_trusted() {
        let (mut controller, _sensor, _notifier) = started(MonitorSettings::default());
        let exact = LocationSample {
            speed_accuracy: 0.0,
            ..still(0.0)
        };
        controller.observe(&exact);
        assert_eq!(controller.stationary_anchor().unwrap().timestamp, 0.0);

        controller.observe(&LocationSample {
            speed_accuracy: 0.0,
            ..still(60.0)
        });
        assert_eq!(controller.mode(), AccuracyMode::LowAccuracy);
    }

    #[test]
    fn paused_signal_downgrades_and_next_fix_promotes() {
        let (mut controller, sensor, notifier) = started(MonitorSettings::default());
        sensor.take_calls();
        notifier.take();

        controller.on_paused();
        assert_eq!(controller.mode(), AccuracyMode::LowAccuracy);

        // Already low: a second pause is a no-op.
        controller.on_paused();
        assert_eq!(sensor.take_calls().len(), 3);

        controller.observe(&moving(10.0));
        assert_eq!(controller.mode(), AccuracyMode::HighAccuracy);
        assert_eq!(
            sensor.take_calls(),
            vec![
                SensorCall::Configure(AccuracyClass::NearestTenMeters, 0.0, true),
                SensorCall::Stop,
                SensorCall::StartHighFrequency,
            ]
        );
        let bodies: Vec<_> = notifier.take().into_iter().map(|(_, b)| b).collect();
        assert_eq!(bodies, vec!["Low", "High 0m"]);
    }

    #[test]
    fn configuration_failure_keeps_current_mode() {
        let (mut controller, sensor, notifier) = started(MonitorSettings::default());
        sensor.take_calls();
        notifier.take();

        sensor.set_failing(true);
        controller.on_paused();
        assert_eq!(controller.mode(), AccuracyMode::HighAccuracy);
        assert!(notifier.take().is_empty());
        // The high-frequency stream was never stopped.
        assert!(sensor.take_calls().is_empty());

        sensor.set_failing(false);
        controller.on_paused();
        assert_eq!(controller.mode(), AccuracyMode::LowAccuracy);
    }

    #[test]
    fn accuracy_preference_parses_keyword_and_number() {
        let best: AccuracyPreference = serde_yaml::from_str("best").unwrap();
        assert_eq!(best, AccuracyPreference::Best);
        let meters: AccuracyPreference = serde_yaml::from_str("15").unwrap();
        assert_eq!(meters, AccuracyPreference::Meters(15.0));
        assert!(serde_yaml::from_str::<AccuracyPreference>("fastest").is_err());
    }
}
