use thiserror::Error;

use crate::parser::ParseError;

#[derive(Error, Debug)]
pub enum FaturaError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parse failed: {0}")]
    Parse(#[from] ParseError),

    #[error("Unsupported file type: {0} (expected a JPEG, PNG, WebP, GIF, BMP or TIFF image)")]
    UnsupportedFileType(String),

    #[error("Receipt not found: {0}")]
    ReceiptNotFound(String),

    #[error("Receipt {0} is already being parsed")]
    ParseInProgress(String),

    #[error("Receipt {0} has already been parsed (use --force to parse again)")]
    AlreadyParsed(String),

    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("Invalid date: {0} (expected YYYY-MM-DD)")]
    InvalidDate(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, FaturaError>;
