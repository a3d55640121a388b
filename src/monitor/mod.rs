mod controller;
mod error;
mod filter;
mod sensor;
mod service;

pub use controller::{AccuracyMode, AccuracyPreference, MonitorSettings};
pub use error::SensorError;
pub use filter::FilterSettings;
pub use sensor::{RemoteSensor, SensorEvent, SensorSettings};
pub use service::{LocationMonitor, MonitorStatus};
