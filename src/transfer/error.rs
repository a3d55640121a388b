use std::path::PathBuf;

use thiserror::Error;

use crate::store::StoreError;
use crate::transfer::csv::CsvError;

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("create folder {path} error: {source}")]
    CreateFolder {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("write file {path} error: {source}")]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Csv(#[from] CsvError),
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
    #[error("no calendar day at {0}")]
    InvalidDay(f64),
}
