//! In-process stage pipeline
//!
//! [`Stage`] names every stage in table order together with the tables it
//! reads and writes; [`PipelineRunner`] checks those dependencies against
//! the store before invoking a stage. [`StageOutcome`] is what each stage
//! hands back.

pub mod config;
pub mod runner;
pub mod stage;

pub use config::{PipelineConfig, TrackerSettings};
pub use runner::{PipelineRunner, StageReport};
pub use stage::Stage;

use std::fmt;

/// Rows a stage wrote, per table, plus the inputs it skipped
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageOutcome {
    pub tables: Vec<(&'static str, usize)>,
    /// Inputs left alone because their output already exists or they were excluded
    pub skipped: usize,
}

impl StageOutcome {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wrote(mut self, table: &'static str, rows: usize) -> Self {
        self.tables.push((table, rows));
        self
    }

    pub fn skipped(mut self, count: usize) -> Self {
        self.skipped += count;
        self
    }

    pub fn rows_written(&self) -> usize {
        self.tables.iter().map(|(_, rows)| rows).sum()
    }

    /// Rows written to `table`, if the stage wrote it at all
    pub fn rows_for(&self, table: &str) -> Option<usize> {
        self.tables
            .iter()
            .find(|(name, _)| *name == table)
            .map(|(_, rows)| *rows)
    }
}

impl fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.tables.is_empty() {
            f.write_str("nothing written")?;
        } else {
            let parts: Vec<String> = self
                .tables
                .iter()
                .map(|(table, rows)| format!("{} {}", rows, table))
                .collect();
            write!(f, "wrote {}", parts.join(", "))?;
        }
        if self.skipped > 0 {
            write!(f, "; skipped {}", self.skipped)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_summary() {
        let outcome = StageOutcome::new()
            .wrote("commits", 3)
            .wrote("releases", 1)
            .skipped(2);
        assert_eq!(outcome.rows_written(), 4);
        assert_eq!(outcome.rows_for("releases"), Some(1));
        assert_eq!(outcome.rows_for("issues"), None);
        assert_eq!(outcome.to_string(), "wrote 3 commits, 1 releases; skipped 2");
        assert_eq!(StageOutcome::new().to_string(), "nothing written");
    }
}
