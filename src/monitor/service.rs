use std::sync::Arc;

use serde::Serialize;
use utoipa::ToSchema;

use crate::location::{LocationSample, TrackPoint};
use crate::monitor::controller::{AccuracyController, AccuracyMode, MonitorSettings};
use crate::monitor::filter::{AcceptanceFilter, FilterSettings};
use crate::monitor::sensor::{LocationSensor, SensorEvent};
use crate::notify::Notifier;
use crate::store::PointSink;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MonitorStatus {
    pub mode: AccuracyMode,
    /// Timestamp of the first sample in the current low-motion run.
    pub stationary_since: Option<f64>,
    pub last_accepted: Option<TrackPoint>,
}

/// Single entry point for sensor events. The accuracy controller and the
/// acceptance filter see every fix, in that order; accepted points are
/// handed to the sink without waiting for storage.
pub struct LocationMonitor<S> {
    controller: AccuracyController<S>,
    filter: AcceptanceFilter,
    sink: Box<dyn PointSink>,
    notifier: Arc<dyn Notifier>,
}

impl<S: LocationSensor> LocationMonitor<S> {
    pub fn start(
        sensor: S,
        notifier: Arc<dyn Notifier>,
        monitor: MonitorSettings,
        filter: FilterSettings,
        sink: Box<dyn PointSink>,
    ) -> Self {
        let mut controller = AccuracyController::new(sensor, notifier.clone(), monitor);
        controller.start();
        Self {
            controller,
            filter: AcceptanceFilter::new(filter),
            sink,
            notifier,
        }
    }

    pub fn handle(&mut self, event: SensorEvent) {
        match event {
            SensorEvent::SampleArrived(sample) => self.on_sample(&sample),
            SensorEvent::Paused => self.controller.on_paused(),
            SensorEvent::Failed(e) => log::error!("location manager error: {}", e),
        }
    }

    /// Handles a batch of fixes delivered together. Only the most recent
    /// one is evaluated. Returns whether anything was delivered.
    pub fn deliver(&mut self, batch: &[LocationSample]) -> bool {
        match batch.last() {
            Some(latest) => {
                self.handle(SensorEvent::SampleArrived(*latest));
                true
            }
            None => false,
        }
    }

    pub fn enter_background(&self) {
        log::info!("enter background");
        self.notifier.notify("Entered background", "");
    }

    pub fn status(&self) -> MonitorStatus {
        MonitorStatus {
            mode: self.controller.mode(),
            stationary_since: self.controller.stationary_anchor().map(|s| s.timestamp),
            last_accepted: self.filter.last_accepted().copied().map(TrackPoint::from),
        }
    }

    pub fn sensor(&self) -> &S {
        self.controller.sensor()
    }

    fn on_sample(&mut self, sample: &LocationSample) {
        self.controller.observe(sample);
        if let Some(point) = self.filter.evaluate(sample) {
            self.sink.submit(point);
        }
    }
}
