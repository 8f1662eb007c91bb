use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BudgetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Transaction store not found: {}\nPass --create to start a new store.", .0.display())]
    StoreMissing(PathBuf),

    #[error("Corrupt file {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("Unsupported schema version in {}: found {found}, expected at most {expected}", path.display())]
    UnsupportedVersion {
        path: PathBuf,
        found: u64,
        expected: u64,
    },

    #[error("Store is locked by another session: {} exists (remove it if no session is running)", .0.display())]
    Locked(PathBuf),

    #[error("Unknown format: {0}")]
    UnknownFormat(String),

    #[error("Unknown account type: {0}")]
    UnknownAccount(String),

    #[error("Line {line}: {reason}")]
    MalformedRow { line: u64, reason: String },

    #[error("Usage: {0}")]
    Usage(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

impl From<tempfile::PersistError> for BudgetError {
    fn from(err: tempfile::PersistError) -> Self {
        BudgetError::Io(err.error)
    }
}

pub type Result<T> = std::result::Result<T, BudgetError>;
