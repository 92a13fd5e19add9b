use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoanbookError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[cfg(feature = "xlsx")]
    #[error("Workbook read error: {0}")]
    Workbook(#[from] calamine::Error),

    #[cfg(feature = "xlsx")]
    #[error("Workbook write error: {0}")]
    WorkbookWrite(#[from] rust_xlsxwriter::XlsxError),

    #[error("Settings file not found: {}", .0.display())]
    SettingsNotFound(PathBuf),

    #[error("Invalid settings in {}: {reason}", path.display())]
    InvalidSettings { path: PathBuf, reason: String },

    #[error("Rules file not found: {}", .0.display())]
    RulesNotFound(PathBuf),

    #[error("Invalid rules in {}: {reason}", path.display())]
    InvalidRules { path: PathBuf, reason: String },

    #[error("None of the input files exist: {0}")]
    NoInputFiles(String),

    #[error("No loan records found in: {0}")]
    NoRecords(String),

    #[error("Invalid reporting date '{0}' (expected DD.MM.YYYY)")]
    InvalidDate(String),

    #[error("Column '{key}' not found in {}", file.display())]
    MissingJoinKey { file: PathBuf, key: String },

    #[error("Unknown input format: {}", .0.display())]
    UnknownFormat(PathBuf),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, LoanbookError>;
