use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the relief calibration crates.
///
/// Only [`CalibError::MissingInput`] is fatal to a run; everything else the
/// pipeline can recover from is logged and recorded instead of returned.
#[derive(Error, Debug)]
pub enum CalibError {
    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The required evidence table does not exist.
    #[error("Required input not found: {0}")]
    MissingInput(PathBuf),

    /// A table is missing a column the reader cannot default.
    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// A CSV document could not be read or written.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias used throughout the relief crates.
pub type Result<T> = std::result::Result<T, CalibError>;
