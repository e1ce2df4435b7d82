// Error taxonomy
//
// Domain errors (validation / not found) are returned to callers as values and
// turned into `{success: false, ...}` outcomes. Persistence errors are logged
// and surfaced as warnings; neither kind ever aborts the process.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GradeError {
    /// Input rejected before any mutation took place
    #[error("{0}")]
    Validation(String),

    /// Student, subject, or grade value absent
    #[error("{0}")]
    NotFound(String),
}

impl GradeError {
    pub fn validation(message: impl Into<String>) -> Self {
        GradeError::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        GradeError::NotFound(message.into())
    }

    /// Stable machine-readable tag used in outcomes
    pub fn kind(&self) -> &'static str {
        match self {
            GradeError::Validation(_) => "validation",
            GradeError::NotFound(_) => "not_found",
        }
    }
}

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize gradebook: {0}")]
    Serialize(#[from] serde_json::Error),
}
