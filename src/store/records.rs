//! Persisted record types
//!
//! Base facts (commits, releases, file sizes, tracker items) and the derived
//! per-commit and per-day samples. Each type maps onto one table in
//! [`super::schema`].

use chrono::{DateTime, NaiveDate, Utc};
use std::marker::PhantomData;

use super::record::{checks, Record};
use super::schema::*;
use super::value::{string_list, Row, Value};
use crate::error::ValidationError;

#[derive(Debug, Clone, PartialEq)]
pub struct Commit {
    pub hash: String,
    pub author: String,
    pub author_email: String,
    pub authored_at: DateTime<Utc>,
    pub committer: String,
    pub committer_email: String,
    pub committed_at: DateTime<Utc>,
    /// Parent hashes, first parent first
    pub parents: Vec<String>,
    pub message: String,
}

impl Commit {
    pub fn first_parent(&self) -> Option<&str> {
        self.parents.first().map(String::as_str)
    }

    /// Author identity used for contribution accounting
    pub fn author_key(&self) -> String {
        if self.author_email.trim().is_empty() {
            self.author.trim().to_lowercase()
        } else {
            self.author_email.trim().to_lowercase()
        }
    }
}

/// Sort commits by authored timestamp, ties broken by hash
pub fn sort_chronologically(commits: &mut [Commit]) {
    commits.sort_by(|a, b| {
        a.authored_at
            .cmp(&b.authored_at)
            .then_with(|| a.hash.cmp(&b.hash))
    });
}

impl Record for Commit {
    fn schema() -> &'static TableSchema {
        &COMMITS
    }

    fn to_row(&self) -> Vec<Value> {
        vec![
            Value::Text(self.hash.clone()),
            Value::Text(self.author.clone()),
            Value::Text(self.author_email.clone()),
            Value::Timestamp(self.authored_at),
            Value::Text(self.committer.clone()),
            Value::Text(self.committer_email.clone()),
            Value::Timestamp(self.committed_at),
            string_list(&self.parents),
            Value::Text(self.message.clone()),
        ]
    }

    fn from_row(mut row: Row) -> Result<Self, ValidationError> {
        Ok(Self {
            hash: row.text("hash")?,
            author: row.text("author")?,
            author_email: row.text("author_email")?,
            authored_at: row.timestamp("authored_at")?,
            committer: row.text("committer")?,
            committer_email: row.text("committer_email")?,
            committed_at: row.timestamp("committed_at")?,
            parents: row.string_list("parents")?,
            message: row.text("message")?,
        })
    }

    fn check(&self) -> Result<(), ValidationError> {
        checks::hash(COMMITS.name, "hash", &self.hash)?;
        if self.author.trim().is_empty() && self.author_email.trim().is_empty() {
            return Err(ValidationError::new(COMMITS.name, "author", "author identity must not be empty"));
        }
        for parent in &self.parents {
            checks::hash(COMMITS.name, "parents", parent)?;
        }
        if self.parents.iter().any(|p| p == &self.hash) {
            return Err(ValidationError::new(COMMITS.name, "parents", "commit cannot be its own parent"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub tag_name: String,
    pub commit_hash: String,
}

impl Record for Release {
    fn schema() -> &'static TableSchema {
        &RELEASES
    }

    fn to_row(&self) -> Vec<Value> {
        vec![
            Value::Text(self.tag_name.clone()),
            Value::Text(self.commit_hash.clone()),
        ]
    }

    fn from_row(mut row: Row) -> Result<Self, ValidationError> {
        Ok(Self {
            tag_name: row.text("tag_name")?,
            commit_hash: row.text("commit_hash")?,
        })
    }

    fn check(&self) -> Result<(), ValidationError> {
        checks::non_empty(RELEASES.name, "tag_name", &self.tag_name)?;
        checks::hash(RELEASES.name, "commit_hash", &self.commit_hash)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSize {
    pub commit_hash: String,
    /// Relative to the repository root, `/` separated
    pub path: String,
    pub language: String,
    pub lines_of_code: i64,
    pub blank_lines: i64,
    pub comment_lines: i64,
}

impl Record for FileSize {
    fn schema() -> &'static TableSchema {
        &FILE_SIZES
    }

    fn to_row(&self) -> Vec<Value> {
        vec![
            Value::Text(self.commit_hash.clone()),
            Value::Text(self.path.clone()),
            Value::Text(self.language.clone()),
            Value::Integer(self.lines_of_code),
            Value::Integer(self.blank_lines),
            Value::Integer(self.comment_lines),
        ]
    }

    fn from_row(mut row: Row) -> Result<Self, ValidationError> {
        Ok(Self {
            commit_hash: row.text("commit_hash")?,
            path: row.text("path")?,
            language: row.text("language")?,
            lines_of_code: row.integer("lines_of_code")?,
            blank_lines: row.integer("blank_lines")?,
            comment_lines: row.integer("comment_lines")?,
        })
    }

    fn check(&self) -> Result<(), ValidationError> {
        let table = FILE_SIZES.name;
        checks::hash(table, "commit_hash", &self.commit_hash)?;
        checks::non_empty(table, "path", &self.path)?;
        checks::non_negative(table, "lines_of_code", self.lines_of_code)?;
        checks::non_negative(table, "blank_lines", self.blank_lines)?;
        checks::non_negative(table, "comment_lines", self.comment_lines)
    }
}

/// A commit whose line count failed and was isolated from the sweep
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSizeError {
    pub commit_hash: String,
    pub message: String,
}

impl Record for FileSizeError {
    fn schema() -> &'static TableSchema {
        &FILE_SIZE_ERRORS
    }

    fn to_row(&self) -> Vec<Value> {
        vec![
            Value::Text(self.commit_hash.clone()),
            Value::Text(self.message.clone()),
        ]
    }

    fn from_row(mut row: Row) -> Result<Self, ValidationError> {
        Ok(Self {
            commit_hash: row.text("commit_hash")?,
            message: row.text("message")?,
        })
    }

    fn check(&self) -> Result<(), ValidationError> {
        checks::hash(FILE_SIZE_ERRORS.name, "commit_hash", &self.commit_hash)
    }
}

/// Marks a commit as counted; `file_count` may be 0
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSizeSample {
    pub commit_hash: String,
    pub file_count: i64,
}

impl Record for FileSizeSample {
    fn schema() -> &'static TableSchema {
        &FILE_SIZE_SAMPLES
    }

    fn to_row(&self) -> Vec<Value> {
        vec![
            Value::Text(self.commit_hash.clone()),
            Value::Integer(self.file_count),
        ]
    }

    fn from_row(mut row: Row) -> Result<Self, ValidationError> {
        Ok(Self {
            commit_hash: row.text("commit_hash")?,
            file_count: row.integer("file_count")?,
        })
    }

    fn check(&self) -> Result<(), ValidationError> {
        checks::hash(FILE_SIZE_SAMPLES.name, "commit_hash", &self.commit_hash)?;
        checks::non_negative(FILE_SIZE_SAMPLES.name, "file_count", self.file_count)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectSizePerCommit {
    pub commit_hash: String,
    pub lines_of_code: i64,
}

impl Record for ProjectSizePerCommit {
    fn schema() -> &'static TableSchema {
        &PROJECT_SIZE_PER_COMMIT
    }

    fn to_row(&self) -> Vec<Value> {
        vec![
            Value::Text(self.commit_hash.clone()),
            Value::Integer(self.lines_of_code),
        ]
    }

    fn from_row(mut row: Row) -> Result<Self, ValidationError> {
        Ok(Self {
            commit_hash: row.text("commit_hash")?,
            lines_of_code: row.integer("lines_of_code")?,
        })
    }

    fn check(&self) -> Result<(), ValidationError> {
        checks::hash(PROJECT_SIZE_PER_COMMIT.name, "commit_hash", &self.commit_hash)?;
        checks::non_negative(PROJECT_SIZE_PER_COMMIT.name, "lines_of_code", self.lines_of_code)
    }
}

/// Project size at the end of a day: the size of that day's last commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectSizePerDay {
    pub day: NaiveDate,
    pub lines_of_code: i64,
    /// The commit whose size was sampled
    pub commit_hash: String,
}

impl Record for ProjectSizePerDay {
    fn schema() -> &'static TableSchema {
        &PROJECT_SIZE_PER_DAY
    }

    fn to_row(&self) -> Vec<Value> {
        vec![
            Value::Date(self.day),
            Value::Integer(self.lines_of_code),
            Value::Text(self.commit_hash.clone()),
        ]
    }

    fn from_row(mut row: Row) -> Result<Self, ValidationError> {
        Ok(Self {
            day: row.date("day")?,
            lines_of_code: row.integer("lines_of_code")?,
            commit_hash: row.text("commit_hash")?,
        })
    }

    fn check(&self) -> Result<(), ValidationError> {
        checks::non_negative(PROJECT_SIZE_PER_DAY.name, "lines_of_code", self.lines_of_code)?;
        checks::hash(PROJECT_SIZE_PER_DAY.name, "commit_hash", &self.commit_hash)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductivityPerCommit {
    pub commit_hash: String,
    /// Absolute size change against the first parent
    pub churn: i64,
    /// Signed size change against the first parent
    pub delta: i64,
}

impl Record for ProductivityPerCommit {
    fn schema() -> &'static TableSchema {
        &PRODUCTIVITY_PER_COMMIT
    }

    fn to_row(&self) -> Vec<Value> {
        vec![
            Value::Text(self.commit_hash.clone()),
            Value::Integer(self.churn),
            Value::Integer(self.delta),
        ]
    }

    fn from_row(mut row: Row) -> Result<Self, ValidationError> {
        Ok(Self {
            commit_hash: row.text("commit_hash")?,
            churn: row.integer("churn")?,
            delta: row.integer("delta")?,
        })
    }

    fn check(&self) -> Result<(), ValidationError> {
        let table = PRODUCTIVITY_PER_COMMIT.name;
        checks::hash(table, "commit_hash", &self.commit_hash)?;
        checks::non_negative(table, "churn", self.churn)?;
        if self.churn != self.delta.abs() {
            return Err(ValidationError::new(
                table,
                "churn",
                format!("churn {} does not match |delta| for delta {}", self.churn, self.delta),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductivityPerDay {
    pub day: NaiveDate,
    pub churn: i64,
    pub commit_count: i64,
}

impl Record for ProductivityPerDay {
    fn schema() -> &'static TableSchema {
        &PRODUCTIVITY_PER_DAY
    }

    fn to_row(&self) -> Vec<Value> {
        vec![
            Value::Date(self.day),
            Value::Integer(self.churn),
            Value::Integer(self.commit_count),
        ]
    }

    fn from_row(mut row: Row) -> Result<Self, ValidationError> {
        Ok(Self {
            day: row.date("day")?,
            churn: row.integer("churn")?,
            commit_count: row.integer("commit_count")?,
        })
    }

    fn check(&self) -> Result<(), ValidationError> {
        checks::non_negative(PRODUCTIVITY_PER_DAY.name, "churn", self.churn)?;
        if self.commit_count < 1 {
            return Err(ValidationError::new(PRODUCTIVITY_PER_DAY.name, "commit_count", "must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusFactorPerDay {
    pub day: NaiveDate,
    pub bus_factor: i64,
    /// Distinct authors with at least one commit on or before `day`
    pub author_count: i64,
    /// Contribution unit the factor was computed with
    pub contribution: String,
}

impl Record for BusFactorPerDay {
    fn schema() -> &'static TableSchema {
        &BUS_FACTOR_PER_DAY
    }

    fn to_row(&self) -> Vec<Value> {
        vec![
            Value::Date(self.day),
            Value::Integer(self.bus_factor),
            Value::Integer(self.author_count),
            Value::Text(self.contribution.clone()),
        ]
    }

    fn from_row(mut row: Row) -> Result<Self, ValidationError> {
        Ok(Self {
            day: row.date("day")?,
            bus_factor: row.integer("bus_factor")?,
            author_count: row.integer("author_count")?,
            contribution: row.text("contribution")?,
        })
    }

    fn check(&self) -> Result<(), ValidationError> {
        let table = BUS_FACTOR_PER_DAY.name;
        if self.bus_factor < 1 {
            return Err(ValidationError::new(table, "bus_factor", "must be at least 1"));
        }
        if self.bus_factor > self.author_count {
            return Err(ValidationError::new(
                table,
                "bus_factor",
                format!("{} exceeds the author count {}", self.bus_factor, self.author_count),
            ));
        }
        if !matches!(self.contribution.as_str(), "commits" | "churn") {
            return Err(ValidationError::new(
                table,
                "contribution",
                format!("unknown contribution unit '{}'", self.contribution),
            ));
        }
        Ok(())
    }
}

/// Distinguishes issues from pull requests at the type level
pub trait ItemKind: std::fmt::Debug + Clone + PartialEq + Send + Sync + 'static {
    /// Human readable name, used in log lines
    const LABEL: &'static str;
    const STATES: &'static [&'static str];

    fn schema() -> &'static TableSchema;
    fn spoilage_schema() -> &'static TableSchema;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IssueKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PullRequestKind;

impl ItemKind for IssueKind {
    const LABEL: &'static str = "issue";
    const STATES: &'static [&'static str] = &["OPEN", "CLOSED"];

    fn schema() -> &'static TableSchema {
        &ISSUES
    }

    fn spoilage_schema() -> &'static TableSchema {
        &ISSUE_SPOILAGE_PER_DAY
    }
}

impl ItemKind for PullRequestKind {
    const LABEL: &'static str = "pull request";
    const STATES: &'static [&'static str] = &["OPEN", "CLOSED", "MERGED"];

    fn schema() -> &'static TableSchema {
        &PULL_REQUESTS
    }

    fn spoilage_schema() -> &'static TableSchema {
        &PULL_REQUEST_SPOILAGE_PER_DAY
    }
}

/// An issue or pull request as recorded by the tracker
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedItem<K: ItemKind> {
    /// Tracker-global node id
    pub id: String,
    pub number: i64,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub state: String,
    pub labels: Vec<String>,
    pub kind: PhantomData<K>,
}

pub type Issue = TrackedItem<IssueKind>;
pub type PullRequest = TrackedItem<PullRequestKind>;

impl<K: ItemKind> TrackedItem<K> {
    pub fn new(
        id: impl Into<String>,
        number: i64,
        author: impl Into<String>,
        created_at: DateTime<Utc>,
        closed_at: Option<DateTime<Utc>>,
        state: impl Into<String>,
        labels: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            number,
            author: author.into(),
            created_at,
            closed_at,
            state: state.into(),
            labels,
            kind: PhantomData,
        }
    }
}

impl<K: ItemKind> Record for TrackedItem<K> {
    fn schema() -> &'static TableSchema {
        K::schema()
    }

    fn to_row(&self) -> Vec<Value> {
        vec![
            Value::Text(self.id.clone()),
            Value::Integer(self.number),
            Value::Text(self.author.clone()),
            Value::Timestamp(self.created_at),
            Value::opt_timestamp(self.closed_at),
            Value::Text(self.state.clone()),
            string_list(&self.labels),
        ]
    }

    fn from_row(mut row: Row) -> Result<Self, ValidationError> {
        Ok(Self {
            id: row.text("id")?,
            number: row.integer("number")?,
            author: row.text("author")?,
            created_at: row.timestamp("created_at")?,
            closed_at: row.opt_timestamp("closed_at")?,
            state: row.text("state")?,
            labels: row.string_list("labels")?,
            kind: PhantomData,
        })
    }

    fn check(&self) -> Result<(), ValidationError> {
        let table = K::schema().name;
        checks::non_empty(table, "id", &self.id)?;
        checks::non_empty(table, "author", &self.author)?;
        if self.number < 1 {
            return Err(ValidationError::new(table, "number", "must be at least 1"));
        }
        if !K::STATES.contains(&self.state.as_str()) {
            return Err(ValidationError::new(
                table,
                "state",
                format!("unknown {} state '{}'", K::LABEL, self.state),
            ));
        }
        if let Some(closed_at) = self.closed_at {
            if closed_at < self.created_at {
                return Err(ValidationError::new(table, "closed_at", "precedes created_at"));
            }
        }
        Ok(())
    }
}

/// Mean lifetime of the items closed on one day
#[derive(Debug, Clone, PartialEq)]
pub struct SpoilagePerDay<K: ItemKind> {
    pub day: NaiveDate,
    pub closed_count: i64,
    /// `None` when nothing closed that day
    pub mean_lifetime_seconds: Option<f64>,
    pub kind: PhantomData<K>,
}

pub type IssueSpoilagePerDay = SpoilagePerDay<IssueKind>;
pub type PullRequestSpoilagePerDay = SpoilagePerDay<PullRequestKind>;

impl<K: ItemKind> SpoilagePerDay<K> {
    pub fn new(day: NaiveDate, closed_count: i64, mean_lifetime_seconds: Option<f64>) -> Self {
        Self {
            day,
            closed_count,
            mean_lifetime_seconds,
            kind: PhantomData,
        }
    }
}

impl<K: ItemKind> Record for SpoilagePerDay<K> {
    fn schema() -> &'static TableSchema {
        K::spoilage_schema()
    }

    fn to_row(&self) -> Vec<Value> {
        vec![
            Value::Date(self.day),
            Value::Integer(self.closed_count),
            Value::opt_real(self.mean_lifetime_seconds),
        ]
    }

    fn from_row(mut row: Row) -> Result<Self, ValidationError> {
        Ok(Self {
            day: row.date("day")?,
            closed_count: row.integer("closed_count")?,
            mean_lifetime_seconds: row.opt_real("mean_lifetime_seconds")?,
            kind: PhantomData,
        })
    }

    fn check(&self) -> Result<(), ValidationError> {
        let table = K::spoilage_schema().name;
        checks::non_negative(table, "closed_count", self.closed_count)?;
        match (self.closed_count, self.mean_lifetime_seconds) {
            (0, Some(_)) => Err(ValidationError::new(
                table,
                "mean_lifetime_seconds",
                "must be null on a day without closures",
            )),
            (n, None) if n > 0 => Err(ValidationError::new(
                table,
                "mean_lifetime_seconds",
                "must be set on a day with closures",
            )),
            (_, Some(mean)) if mean < 0.0 => Err(ValidationError::new(
                table,
                "mean_lifetime_seconds",
                "must not be negative",
            )),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IssueDensityPerDay {
    pub day: NaiveDate,
    pub open_issues: i64,
    /// Project size in thousands of lines
    pub kloc: f64,
    /// Open issues per KLOC, `None` when the project has no code
    pub density: Option<f64>,
}

impl Record for IssueDensityPerDay {
    fn schema() -> &'static TableSchema {
        &ISSUE_DENSITY_PER_DAY
    }

    fn to_row(&self) -> Vec<Value> {
        vec![
            Value::Date(self.day),
            Value::Integer(self.open_issues),
            Value::Real(self.kloc),
            Value::opt_real(self.density),
        ]
    }

    fn from_row(mut row: Row) -> Result<Self, ValidationError> {
        Ok(Self {
            day: row.date("day")?,
            open_issues: row.integer("open_issues")?,
            kloc: row.real("kloc")?,
            density: row.opt_real("density")?,
        })
    }

    fn check(&self) -> Result<(), ValidationError> {
        let table = ISSUE_DENSITY_PER_DAY.name;
        checks::non_negative(table, "open_issues", self.open_issues)?;
        if self.kloc < 0.0 {
            return Err(ValidationError::new(table, "kloc", "must not be negative"));
        }
        if self.kloc == 0.0 && self.density.is_some() {
            return Err(ValidationError::new(table, "density", "must be null when kloc is zero"));
        }
        if self.kloc > 0.0 && self.density.is_none() {
            return Err(ValidationError::new(table, "density", "must be set when kloc is positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::record::validate_batch;
    use chrono::TimeZone;

    const H1: &str = "1111111111111111111111111111111111111111";
    const H2: &str = "2222222222222222222222222222222222222222";

    fn commit(hash: &str, parents: &[&str]) -> Commit {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        Commit {
            hash: hash.to_string(),
            author: "Alice".to_string(),
            author_email: "Alice@Example.com".to_string(),
            authored_at: at,
            committer: "Alice".to_string(),
            committer_email: "alice@example.com".to_string(),
            committed_at: at,
            parents: parents.iter().map(|p| p.to_string()).collect(),
            message: "init".to_string(),
        }
    }

    #[test]
    fn test_commit_checks_hashes() {
        assert!(commit(H1, &[]).check().is_ok());
        assert!(commit(H2, &[H1]).check().is_ok());

        let err = commit("not-a-hash", &[]).check().unwrap_err();
        assert_eq!(err.field, "hash");

        let err = commit(H2, &["xyz"]).check().unwrap_err();
        assert_eq!(err.field, "parents");
    }

    #[test]
    fn test_author_key_is_lower_cased_email() {
        assert_eq!(commit(H1, &[]).author_key(), "alice@example.com");

        let mut nameless = commit(H1, &[]);
        nameless.author_email = String::new();
        assert_eq!(nameless.author_key(), "alice");
    }

    #[test]
    fn test_sort_chronologically_breaks_ties_by_hash() {
        let mut commits = vec![commit(H2, &[]), commit(H1, &[])];
        sort_chronologically(&mut commits);
        assert_eq!(commits[0].hash, H1);

        commits[0].authored_at = commits[0].authored_at + chrono::Duration::hours(1);
        sort_chronologically(&mut commits);
        assert_eq!(commits[0].hash, H2);
    }

    #[test]
    fn test_file_size_rejects_negative_counts() {
        let record = FileSize {
            commit_hash: H1.to_string(),
            path: "src/lib.rs".to_string(),
            language: "Rust".to_string(),
            lines_of_code: -1,
            blank_lines: 0,
            comment_lines: 0,
        };
        let err = validate_batch(&[record]).unwrap_err();
        assert_eq!(err.table, "file_sizes");
        assert_eq!(err.field, "lines_of_code");
        assert_eq!(err.row, Some(0));
    }

    #[test]
    fn test_batch_rejects_duplicate_keys() {
        let err = validate_batch(&[commit(H1, &[]), commit(H2, &[]), commit(H1, &[])]).unwrap_err();
        assert_eq!(err.row, Some(2));
        assert!(err.reason.starts_with("duplicate key"));
    }

    #[test]
    fn test_tracked_item_checks() {
        let created = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let before = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let ok = Issue::new("I_1", 1, "octocat", created, None, "OPEN", vec![]);
        assert!(ok.check().is_ok());

        let merged = Issue::new("I_2", 2, "octocat", created, Some(created), "MERGED", vec![]);
        assert_eq!(merged.check().unwrap_err().field, "state");
        let merged = PullRequest::new("P_2", 2, "octocat", created, Some(created), "MERGED", vec![]);
        assert!(merged.check().is_ok());

        let backwards = Issue::new("I_3", 3, "octocat", created, Some(before), "CLOSED", vec![]);
        assert_eq!(backwards.check().unwrap_err().field, "closed_at");
    }

    #[test]
    fn test_spoilage_mean_matches_closures() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert!(IssueSpoilagePerDay::new(day, 0, None).check().is_ok());
        assert!(IssueSpoilagePerDay::new(day, 1, Some(0.0)).check().is_ok());
        assert!(IssueSpoilagePerDay::new(day, 0, Some(0.0)).check().is_err());
        assert!(IssueSpoilagePerDay::new(day, 2, None).check().is_err());
    }

    #[test]
    fn test_bus_factor_bounds() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let sample = |bus_factor, author_count| BusFactorPerDay {
            day,
            bus_factor,
            author_count,
            contribution: "commits".to_string(),
        };
        assert!(sample(1, 1).check().is_ok());
        assert!(sample(0, 1).check().is_err());
        assert!(sample(3, 2).check().is_err());
    }
}
