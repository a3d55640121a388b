pub mod geo;
mod types;

pub use types::{to_datetime, to_seconds, LocationSample, TrackPoint};
