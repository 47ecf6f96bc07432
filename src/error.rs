use std::path::PathBuf;

use thiserror::Error;

/// Failures of a single prediction run. None of these touch the loaded
/// schema or model, so the caller can report and keep going.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to load {kind} from {}: {reason}", .path.display())]
    Startup {
        kind: &'static str,
        path: PathBuf,
        reason: String,
    },

    #[error("invalid feature schema: {0}")]
    InvalidSchema(String),

    #[error("input is missing required columns: {}", .missing.join(", "))]
    SchemaMismatch { missing: Vec<String> },

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("model reports {got} probability columns but {expected} class labels")]
    ClassMismatch { expected: usize, got: usize },

    #[error("invalid student record: {}", .0.join("; "))]
    InvalidForm(Vec<String>),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    /// Short name of the failure kind, used as the prefix of CLI messages.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Startup { .. } | PipelineError::InvalidSchema(_) => "startup error",
            PipelineError::SchemaMismatch { .. } => "schema mismatch",
            PipelineError::Inference(_) => "inference error",
            PipelineError::ClassMismatch { .. } => "class mismatch",
            PipelineError::InvalidForm(_) => "invalid input",
            PipelineError::Io(_) | PipelineError::Csv(_) | PipelineError::Json(_) => "io error",
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
