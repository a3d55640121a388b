pub mod error;
pub mod notifications;
pub mod points;
pub mod sensor;
pub mod transfer;
