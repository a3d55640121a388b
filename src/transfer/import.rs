use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use utoipa::ToSchema;

use crate::notify::Notifier;
use crate::store::Storage;
use crate::transfer::csv;
use crate::transfer::TransferError;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ImportedFile {
    pub file: String,
    pub points: usize,
    /// Existing points deleted by override.
    pub replaced: usize,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FailedFile {
    pub file: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct ImportReport {
    pub imported: Vec<ImportedFile>,
    pub failed: Vec<FailedFile>,
}

pub fn import_folder(root: &Path) -> PathBuf {
    root.join("import")
}

/// Imports every `.csv` file under `<root>/import`, recursively. A bad
/// file is logged and skipped; the rest of the batch still goes in.
///
/// With `override_existing`, each file first clears the stored points
/// between its smallest and largest timestamp (inclusive).
pub fn import_all(
    storage: &Storage,
    root: &Path,
    notifier: &dyn Notifier,
    override_existing: bool,
) -> Result<ImportReport, TransferError> {
    let folder = import_folder(root);
    if !folder.exists() {
        fs::create_dir_all(&folder).map_err(|source| {
            log::error!("FAIL: create folder {} error {}", folder.display(), source);
            TransferError::CreateFolder {
                path: folder.clone(),
                source,
            }
        })?;
    }

    let mut files = Vec::new();
    collect_files(&folder, &mut files).map_err(|e| {
        log::error!("FAIL: error was found when listing import files: {}", e);
        e
    })?;
    files.sort();

    let mut report = ImportReport::default();
    for file in files {
        if file.extension().and_then(|e| e.to_str()) != Some("csv") {
            continue;
        }

        match import_file(storage, &file, override_existing) {
            Ok(None) => log::info!("{} has no rows, skipping", file.display()),
            Ok(Some(imported)) => {
                notifier.notify(
                    "Import",
                    &format!(
                        "saved {} location points to {}",
                        imported.points,
                        file.display()
                    ),
                );
                report.imported.push(imported);
            }
            Err(e) => {
                match &e {
                    TransferError::Store(_) => {
                        log::error!("Error found when trying to save locations from {}: {}", file.display(), e)
                    }
                    _ => log::error!("FAIL: {} {}", file.display(), e),
                }
                report.failed.push(FailedFile {
                    file: file.display().to_string(),
                    error: e.to_string(),
                });
            }
        }
    }

    log::info!(
        "Import finished: {} files imported, {} failed",
        report.imported.len(),
        report.failed.len()
    );
    Ok(report)
}

/// Parses the whole file before touching the store, so a bad row leaves
/// the store unchanged. `None` when the file has a header but no rows.
pub fn import_file(
    storage: &Storage,
    file: &Path,
    override_existing: bool,
) -> Result<Option<ImportedFile>, TransferError> {
    let content = fs::read_to_string(file)?;
    let points = csv::parse(&content)?;

    if points.is_empty() {
        return Ok(None);
    }

    let replaced = if override_existing {
        let (start, end) = points.iter().fold((f64::MAX, f64::MIN), |(lo, hi), p| {
            (lo.min(p.timestamp), hi.max(p.timestamp))
        });
        storage.replace_range(start, end, &points)?
    } else {
        storage.insert_many(&points)?;
        0
    };

    Ok(Some(ImportedFile {
        file: file.display().to_string(),
        points: points.len(),
        replaced,
    }))
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with('.'))
            .unwrap_or(false);
        if hidden {
            continue;
        }

        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_files(&path, files)?;
        } else if file_type.is_file() {
            files.push(path);
        }
    }
    Ok(())
}
