//! Error type shared by every stage of the study pipeline.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StudyError {
    /// A required input artifact is not on disk.
    #[error("Required input not found at {}. {hint}", path.display())]
    MissingInput { path: PathBuf, hint: String },

    /// A filter or join produced zero rows.
    #[error("{stage} produced no rows: {detail}")]
    EmptyResult { stage: &'static str, detail: String },

    /// The regression cannot be estimated on the given rows.
    #[error("Model is degenerate: {reason}")]
    ModelDegenerate { reason: String },

    #[error("Configuration error in `{field}`: {reason}")]
    Config { field: String, reason: String },

    /// A raw row that parsed as CSV but not as a count record.
    #[error("Invalid record at line {line}: {detail}")]
    InvalidRecord { line: u64, detail: String },

    /// Panel rows that break the one-row-per-unit-year or fixed-group rules.
    #[error("Invalid panel: {detail}")]
    InvalidPanel { detail: String },

    #[error("Boundary data error: {detail}")]
    Boundary { detail: String },

    #[error("CSV processing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Shapefile error: {0}")]
    Shapefile(#[from] shapefile::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StudyError {
    pub fn missing_input(path: impl Into<PathBuf>, hint: impl Into<String>) -> Self {
        StudyError::MissingInput {
            path: path.into(),
            hint: hint.into(),
        }
    }

    pub fn degenerate(reason: impl Into<String>) -> Self {
        StudyError::ModelDegenerate {
            reason: reason.into(),
        }
    }

    pub fn config(field: &str, reason: impl Into<String>) -> Self {
        StudyError::Config {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StudyError>;
