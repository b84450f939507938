use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MarkingError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid rubric: {0}")]
    InvalidRubric(String),

    #[error("Failed to persist rubric to {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Marker {marker_id} failed: {reason}")]
    MarkerFailed { marker_id: usize, reason: String },
}

pub type Result<T> = std::result::Result<T, MarkingError>;
