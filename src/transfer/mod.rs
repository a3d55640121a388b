pub mod csv;
mod error;
pub mod export;
pub mod import;

pub use error::TransferError;
pub use export::{export_with_calendar, ExportCalendar, ExportReport};
pub use import::{import_all, ImportReport};
