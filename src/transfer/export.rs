use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::location::{to_datetime, to_seconds};
use crate::store::{Storage, TrackSnapshot};
use crate::transfer::csv;
use crate::transfer::TransferError;

/// Calendar that decides where one exported day ends and the next begins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportCalendar {
    #[default]
    Local,
    Utc,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct ExportReport {
    pub written: usize,
    pub skipped: usize,
}

/// `<root>/export/<yyyy>/<MM>/<yyyy-MM-dd>.csv`
pub fn day_file(root: &Path, day: NaiveDate) -> PathBuf {
    root.join("export")
        .join(day.format("%Y/%m").to_string())
        .join(format!("{}.csv", day.format("%Y-%m-%d")))
}

pub fn export_with_calendar(
    storage: &Storage,
    root: &Path,
    calendar: ExportCalendar,
    now: DateTime<Utc>,
    force: bool,
) -> Result<ExportReport, TransferError> {
    match calendar {
        ExportCalendar::Local => export_all(storage, root, &Local, now, force),
        ExportCalendar::Utc => export_all(storage, root, &Utc, now, force),
    }
}

/// Writes one file per calendar day from the first recorded day through
/// today. Closed days that already have a file are left alone unless
/// `force` is set; the still-open day is always rewritten. Stops at the
/// first failure. An empty store writes nothing at all instead of walking
/// days from the epoch.
pub fn export_all<Tz: TimeZone>(
    storage: &Storage,
    root: &Path,
    tz: &Tz,
    now: DateTime<Utc>,
    force: bool,
) -> Result<ExportReport, TransferError> {
    let snapshot = storage.snapshot();
    let mut report = ExportReport::default();

    if snapshot.is_empty() {
        log::info!("Nothing to export");
        return Ok(report);
    }

    let min = snapshot.min_timestamp();
    let first = to_datetime(min).ok_or(TransferError::InvalidDay(min))?;
    let mut day = first.with_timezone(tz).date_naive();
    let today = now.with_timezone(tz).date_naive();
    let now_s = to_seconds(&now);

    while day <= today {
        let (_, day_end) = day_bounds(day, tz)?;
        let file = day_file(root, day);

        if force || day_end > now_s || !file.exists() {
            write_day(&snapshot, root, day, tz)?;
            report.written += 1;
        } else {
            report.skipped += 1;
        }

        day = match day.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }

    log::info!(
        "Export finished: {} written, {} skipped",
        report.written,
        report.skipped
    );
    Ok(report)
}

/// Writes a single day's file, replacing any existing one.
pub fn write_day<Tz: TimeZone>(
    snapshot: &TrackSnapshot,
    root: &Path,
    day: NaiveDate,
    tz: &Tz,
) -> Result<PathBuf, TransferError> {
    let (start, end) = day_bounds(day, tz)?;
    let file = day_file(root, day);

    if let Some(folder) = file.parent() {
        fs::create_dir_all(folder).map_err(|source| {
            log::error!("FAIL: create folder {} error {}", folder.display(), source);
            TransferError::CreateFolder {
                path: folder.to_path_buf(),
                source,
            }
        })?;
    }

    let content = csv::render(snapshot.points_in_range(start, end))?;
    write_atomically(&file, &content).map_err(|source| {
        log::error!("FAIL: write file {} error {}", file.display(), source);
        TransferError::WriteFile {
            path: file.clone(),
            source,
        }
    })?;

    Ok(file)
}

/// Start of `day` and start of the following day, in epoch seconds.
fn day_bounds<Tz: TimeZone>(day: NaiveDate, tz: &Tz) -> Result<(f64, f64), TransferError> {
    let start = start_of_day(day, tz)?;
    let next = day
        .succ_opt()
        .ok_or(TransferError::InvalidDay(start))?;
    Ok((start, start_of_day(next, tz)?))
}

fn start_of_day<Tz: TimeZone>(day: NaiveDate, tz: &Tz) -> Result<f64, TransferError> {
    let midnight = day
        .and_hms_opt(0, 0, 0)
        .ok_or(TransferError::InvalidDay(0.0))?;
    let local = tz.from_local_datetime(&midnight);
    // A DST gap can swallow midnight; fall back to the UTC reading
    let start = local
        .earliest()
        .map(|dt| to_seconds(&dt))
        .unwrap_or_else(|| to_seconds(&midnight.and_utc()));
    Ok(start)
}

fn write_atomically(path: &Path, content: &str) -> std::io::Result<()> {
    let tmp = path.with_extension("csv.tmp");
    fs::write(&tmp, content)?;
    fs::rename(&tmp, path)
}
