// Gradebook - Core Library
// Exposes all modules for use in the CLI, the API server, and tests

pub mod normalize;
pub mod error;
pub mod store;
pub mod grading;
pub mod persistence;
pub mod outcome;
pub mod service;
pub mod export;
pub mod config;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use normalize::{normalize_name, normalize_subject};
pub use error::{GradeError, PersistenceError};
pub use store::{
    Grade, Gradebook, SubjectGrades, parse_grades,
    StudentAdded, GradesAdded, GradeRemoved, StudentRemoval,
};
pub use grading::{
    LetterGrade, letter_grade,
    StudentReport, SubjectSummary, SubjectAverage, RankEntry,
};
pub use persistence::{JsonFileStore, BACKUP_TIMESTAMP_FORMAT};
pub use outcome::Outcome;
pub use service::GradebookService;
pub use export::{export_csv, write_csv, ExportRow};
pub use config::Config;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
