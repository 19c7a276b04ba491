//! External line counter
//!
//! The sampler only sees the [`LineCounter`] trait. [`SccCounter`] drives
//! the `scc` binary in per-file CSV mode.

use log::debug;
use std::path::Path;
use std::process::Command;
use thiserror::Error;

/// Line counts for one file of a checkout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCount {
    /// Relative to the checkout root, `/` separated
    pub path: String,
    pub language: String,
    pub code: i64,
    pub blanks: i64,
    pub comments: i64,
}

#[derive(Debug, Error)]
pub enum CounterError {
    /// The counter could not be started at all
    #[error("failed to launch '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' exited with {status}: {stderr}")]
    Failed { program: String, status: String, stderr: String },

    #[error("unexpected output from '{program}': {message}")]
    Parse { program: String, message: String },
}

impl CounterError {
    /// Whether the failure says nothing about the commit being counted
    pub fn is_fatal(&self) -> bool {
        matches!(self, CounterError::Launch { .. })
    }
}

pub trait LineCounter: Send + Sync {
    fn name(&self) -> &str;

    /// Count every file under `dir`
    fn count(&self, dir: &Path) -> Result<Vec<FileCount>, CounterError>;
}

/// Runs `scc --format=csv --by-file` over a directory
#[derive(Debug, Clone)]
pub struct SccCounter {
    program: String,
}

impl Default for SccCounter {
    fn default() -> Self {
        Self::new("scc")
    }
}

impl SccCounter {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }

    fn parse_error(&self, message: impl Into<String>) -> CounterError {
        CounterError::Parse {
            program: self.program.clone(),
            message: message.into(),
        }
    }

    /// Parse scc's per-file CSV report. Columns are located by header name
    /// so reports with or without the newer `ULOC` column both work.
    pub fn parse_report(&self, csv: &str, root: &Path) -> Result<Vec<FileCount>, CounterError> {
        let mut lines = csv.lines().filter(|l| !l.trim().is_empty());
        let header = match lines.next() {
            Some(header) => split_csv_line(header),
            None => return Ok(Vec::new()),
        };

        let column = |names: &[&str]| {
            header
                .iter()
                .position(|h| names.iter().any(|n| h.eq_ignore_ascii_case(n)))
                .ok_or_else(|| self.parse_error(format!("missing column {}", names[0])))
        };
        let language = column(&["Language"])?;
        let location = column(&["Provider", "Location"])?;
        let code = column(&["Code"])?;
        let comments = column(&["Comments", "Comment"])?;
        let blanks = column(&["Blanks", "Blank"])?;
        let width = [language, location, code, comments, blanks]
            .into_iter()
            .max()
            .unwrap_or(0);

        let mut counts = Vec::new();
        for (line_no, line) in lines.enumerate() {
            let fields = split_csv_line(line);
            if fields.len() <= width {
                return Err(self.parse_error(format!("line {} has {} fields", line_no + 2, fields.len())));
            }
            let number = |index: usize| {
                fields[index]
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| self.parse_error(format!("line {}: '{}' is not a count", line_no + 2, fields[index])))
            };
            counts.push(FileCount {
                path: relative_path(&fields[location], root),
                language: fields[language].clone(),
                code: number(code)?,
                blanks: number(blanks)?,
                comments: number(comments)?,
            });
        }
        Ok(counts)
    }
}

impl LineCounter for SccCounter {
    fn name(&self) -> &str {
        &self.program
    }

    fn count(&self, dir: &Path) -> Result<Vec<FileCount>, CounterError> {
        debug!("Running {} over {}", self.program, dir.display());
        let output = Command::new(&self.program)
            .args([
                "--format=csv",
                "--by-file",
                "--no-cocomo",
                "--no-complexity",
                "--no-min-gen",
                "--no-size",
            ])
            .arg(dir)
            .output()
            .map_err(|source| CounterError::Launch {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(CounterError::Failed {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        self.parse_report(&stdout, dir)
    }
}

/// Strip the checkout root from a reported path and normalise separators
fn relative_path(reported: &str, root: &Path) -> String {
    let path = Path::new(reported);
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .filter_map(|c| match c {
            std::path::Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Split one CSV record, honouring double-quoted fields
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.trim_end_matches('\r').chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = "\
Language,Provider,Filename,Lines,Code,Comments,Blanks,Complexity,Bytes,ULOC
Rust,/tmp/co/commit_abcdef12/src/main.rs,main.rs,12,9,1,2,0,200,10
Markdown,\"/tmp/co/commit_abcdef12/docs/a, b.md\",\"a, b.md\",5,4,0,1,0,80,4
";

    #[test]
    fn test_parse_report_strips_root() {
        let counter = SccCounter::default();
        let counts = counter
            .parse_report(REPORT, Path::new("/tmp/co/commit_abcdef12"))
            .unwrap();
        assert_eq!(counts.len(), 2);
        assert_eq!(
            counts[0],
            FileCount {
                path: "src/main.rs".to_string(),
                language: "Rust".to_string(),
                code: 9,
                blanks: 2,
                comments: 1,
            }
        );
        assert_eq!(counts[1].path, "docs/a, b.md");
        assert_eq!(counts[1].code, 4);
    }

    #[test]
    fn test_parse_report_without_uloc_column() {
        let report = "Language,Location,Filename,Lines,Code,Comments,Blanks,Complexity,Bytes\n\
                      Python,/r/x.py,x.py,3,3,0,0,0,10\n";
        let counts = SccCounter::default().parse_report(report, Path::new("/r")).unwrap();
        assert_eq!(counts[0].path, "x.py");
        assert_eq!(counts[0].code, 3);
    }

    #[test]
    fn test_parse_report_rejects_bad_counts() {
        let report = "Language,Provider,Filename,Lines,Code,Comments,Blanks\nRust,/r/a.rs,a.rs,1,x,0,0\n";
        let err = SccCounter::default().parse_report(report, Path::new("/r")).unwrap_err();
        assert!(matches!(err, CounterError::Parse { .. }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_empty_report_has_no_files() {
        assert!(SccCounter::default().parse_report("", Path::new("/r")).unwrap().is_empty());
    }

    #[test]
    fn test_missing_program_is_fatal() {
        let counter = SccCounter::new("prime-test-no-such-counter");
        let err = counter.count(Path::new(".")).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_split_csv_line_quotes() {
        assert_eq!(split_csv_line("a,\"b,c\",\"d\"\"e\""), vec!["a", "b,c", "d\"e"]);
        assert_eq!(split_csv_line("a,,b"), vec!["a", "", "b"]);
    }
}
