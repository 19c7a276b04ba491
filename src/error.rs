//! Pipeline Error Types
//!
//! Every stage returns [`PipelineError`]. The variants follow the failure
//! classes of the pipeline: schema validation, missing upstream tables,
//! repository access, tracker calls, and the line counter.

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::tracker::TrackerError;

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// A record or table that does not match its declared schema.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("validation failed for {table}.{field}{}: {reason}", row_suffix(.row))]
pub struct ValidationError {
    pub table: String,
    pub field: String,
    /// Position of the offending record in its batch, when there is one
    pub row: Option<usize>,
    pub reason: String,
}

fn row_suffix(row: &Option<usize>) -> String {
    match row {
        Some(index) => format!(" (row {index})"),
        None => String::new(),
    }
}

impl ValidationError {
    pub fn new(table: impl Into<String>, field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            field: field.into(),
            row: None,
            reason: reason.into(),
        }
    }

    pub fn at_row(mut self, row: usize) -> Self {
        self.row = Some(row);
        self
    }
}

/// Errors that can occur while running a pipeline stage
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A persisted or in-flight record failed schema checks
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A derived stage's upstream table is absent or empty
    #[error("stage '{stage}' requires table '{table}', which is empty or missing.\n\nRun the stage that produces '{table}' first.")]
    MissingDependency { stage: String, table: String },

    /// Repository path invalid, unreadable, or checkout failed
    #[error("repository error at {}: {message}", .path.display())]
    VcsAccess { path: PathBuf, message: String },

    /// Issue tracker call failed
    #[error(transparent)]
    Tracker(#[from] TrackerError),

    /// The external line counter failed on a single commit
    #[error("line counter failed on commit {commit}: {message}")]
    LineCounter { commit: String, message: String },

    /// Too many commits failed line counting for the sweep to be trusted
    #[error("line counting failed on {failed} of {attempted} commits, above the allowed ratio of {max_ratio}")]
    FailureThreshold { failed: usize, attempted: usize, max_ratio: f64 },

    /// Underlying SQLite failure
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stage invoked without the inputs it needs
    #[error("configuration problem: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn missing_dependency(stage: impl Into<String>, table: impl Into<String>) -> Self {
        Self::MissingDependency {
            stage: stage.into(),
            table: table.into(),
        }
    }

    pub fn vcs_access(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Self::VcsAccess {
            path: path.as_ref().to_path_buf(),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Process exit status for this failure
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::VcsAccess { .. } => 2,
            Self::Validation(_) => 3,
            Self::MissingDependency { .. } => 4,
            Self::Tracker(_) => 5,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display_names_table_and_field() {
        let err = ValidationError::new("file_sizes", "lines_of_code", "must not be negative").at_row(7);
        assert_eq!(
            err.to_string(),
            "validation failed for file_sizes.lines_of_code (row 7): must not be negative"
        );

        let err = ValidationError::new("commits", "hash", "duplicate key");
        assert_eq!(err.to_string(), "validation failed for commits.hash: duplicate key");
    }

    #[test]
    fn test_exit_codes_are_distinct_per_kind() {
        let vcs = PipelineError::vcs_access("/tmp/x", "not a repository");
        let validation = PipelineError::from(ValidationError::new("t", "f", "r"));
        let missing = PipelineError::missing_dependency("project-size", "file_sizes");
        let tracker = PipelineError::from(TrackerError::Unauthorized);
        let config = PipelineError::config("no repository");

        assert_eq!(vcs.exit_code(), 2);
        assert_eq!(validation.exit_code(), 3);
        assert_eq!(missing.exit_code(), 4);
        assert_eq!(tracker.exit_code(), 5);
        assert_eq!(config.exit_code(), 1);
    }

    #[test]
    fn test_missing_dependency_message() {
        let err = PipelineError::missing_dependency("issue-density", "issues");
        let msg = err.to_string();
        assert!(msg.contains("'issue-density'"));
        assert!(msg.contains("'issues'"));
    }
}
