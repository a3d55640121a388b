use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use thiserror::Error;

use crate::location::TrackPoint;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Track points ordered by timestamp, optionally backed by a JSON-lines
/// journal so the track survives restarts.
///
/// Appends add one journal line. Range replacement rewrites the journal
/// through a temporary file and only then swaps the in-memory index, so a
/// failed rewrite leaves both untouched.
pub struct Storage {
    journal: Option<PathBuf>,
    points: RwLock<Vec<TrackPoint>>,
}

impl Storage {
    #[cfg(test)]
    pub fn in_memory() -> Self {
        Storage {
            journal: None,
            points: RwLock::new(Vec::new()),
        }
    }

    pub fn open(journal: PathBuf) -> Result<Self, StoreError> {
        let mut points = Vec::new();

        if journal.exists() {
            let content = fs::read_to_string(&journal)?;
            for (i, line) in content.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<TrackPoint>(line) {
                    Ok(point) => points.push(point),
                    Err(e) => {
                        log::warn!("Skipping journal line {} in {}: {}", i + 1, journal.display(), e);
                    }
                }
            }
        } else if let Some(parent) = journal.parent() {
            fs::create_dir_all(parent)?;
        }

        points.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        log::info!("Loaded {} track points from {}", points.len(), journal.display());

        Ok(Storage {
            journal: Some(journal),
            points: RwLock::new(points),
        })
    }

    pub fn len(&self) -> usize {
        self.points.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn insert(&self, point: TrackPoint) -> Result<(), StoreError> {
        let mut points = self.points.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(journal) = &self.journal {
            append_lines(journal, std::slice::from_ref(&point))?;
        }
        insert_sorted(&mut points, point);
        Ok(())
    }

    pub fn insert_many(&self, new_points: &[TrackPoint]) -> Result<(), StoreError> {
        let mut points = self.points.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(journal) = &self.journal {
            append_lines(journal, new_points)?;
        }
        for point in new_points {
            insert_sorted(&mut points, *point);
        }
        Ok(())
    }

    /// Deletes every point with `start <= timestamp <= end`, then inserts
    /// `replacement`, as one operation. Returns the number of deleted points.
    pub fn replace_range(
        &self,
        start: f64,
        end: f64,
        replacement: &[TrackPoint],
    ) -> Result<usize, StoreError> {
        let mut points = self.points.write().unwrap_or_else(PoisonError::into_inner);

        let mut next: Vec<TrackPoint> = points
            .iter()
            .filter(|p| p.timestamp < start || p.timestamp > end)
            .copied()
            .collect();
        let removed = points.len() - next.len();
        next.extend_from_slice(replacement);
        next.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));

        if let Some(journal) = &self.journal {
            rewrite_journal(journal, &next)?;
        }
        *points = next;
        Ok(removed)
    }

    /// Points with `start <= timestamp < end`, ascending.
    pub fn points_in_range(&self, start: f64, end: f64) -> Vec<TrackPoint> {
        let points = self.points.read().unwrap_or_else(PoisonError::into_inner);
        range_of(&points, start, end).to_vec()
    }

    /// Earliest stored timestamp, or the epoch when the store is empty.
    pub fn min_timestamp(&self) -> f64 {
        let points = self.points.read().unwrap_or_else(PoisonError::into_inner);
        min_of(&points)
    }

    pub fn max_timestamp(&self) -> Option<f64> {
        let points = self.points.read().unwrap_or_else(PoisonError::into_inner);
        max_of(&points)
    }

    /// Frozen copy for long readers such as export; later writes don't show up.
    pub fn snapshot(&self) -> TrackSnapshot {
        let points = self.points.read().unwrap_or_else(PoisonError::into_inner);
        TrackSnapshot {
            points: points.clone(),
        }
    }
}

pub struct TrackSnapshot {
    points: Vec<TrackPoint>,
}

impl TrackSnapshot {
    pub fn points_in_range(&self, start: f64, end: f64) -> &[TrackPoint] {
        range_of(&self.points, start, end)
    }

    pub fn min_timestamp(&self) -> f64 {
        min_of(&self.points)
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

fn insert_sorted(points: &mut Vec<TrackPoint>, point: TrackPoint) {
    let idx = points.partition_point(|p| p.timestamp <= point.timestamp);
    points.insert(idx, point);
}

fn range_of(points: &[TrackPoint], start: f64, end: f64) -> &[TrackPoint] {
    let lo = points.partition_point(|p| p.timestamp < start);
    let hi = points.partition_point(|p| p.timestamp < end);
    if lo >= hi {
        return &[];
    }
    &points[lo..hi]
}

fn min_of(points: &[TrackPoint]) -> f64 {
    points.first().map(|p| p.timestamp).unwrap_or(0.0)
}

fn max_of(points: &[TrackPoint]) -> Option<f64> {
    points.last().map(|p| p.timestamp)
}

fn append_lines(journal: &Path, points: &[TrackPoint]) -> Result<(), StoreError> {
    let file = OpenOptions::new().create(true).append(true).open(journal)?;
    let mut writer = BufWriter::new(file);
    for point in points {
        serde_json::to_writer(&mut writer, point)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

fn rewrite_journal(journal: &Path, points: &[TrackPoint]) -> Result<(), StoreError> {
    let tmp = journal.with_extension("tmp");
    {
        let file = fs::File::create(&tmp)?;
        let mut writer = BufWriter::new(file);
        for point in points {
            serde_json::to_writer(&mut writer, point)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
    }
    fs::rename(&tmp, journal)?;
    Ok(())
}
