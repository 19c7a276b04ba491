//! Table Schemas
//!
//! One static [`TableSchema`] per persisted entity. The schemas drive DDL
//! generation, the compatibility check performed when a store is opened,
//! and cell-level validation of every record batch.

use std::fmt;

/// Declared SQL type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
    Real,
    /// RFC 3339 UTC text with second precision
    Timestamp,
    /// `YYYY-MM-DD` in the store's reference offset
    Date,
}

impl ColumnType {
    pub fn sql_name(&self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Timestamp => "TIMESTAMP",
            ColumnType::Date => "DATE",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub ty: ColumnType,
    pub nullable: bool,
}

impl ColumnDef {
    pub const fn required(name: &'static str, ty: ColumnType) -> Self {
        Self { name, ty, nullable: false }
    }

    pub const fn optional(name: &'static str, ty: ColumnType) -> Self {
        Self { name, ty, nullable: true }
    }
}

/// `column` must hold a value present in `table.references`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignKey {
    pub column: &'static str,
    pub table: &'static str,
    pub references: &'static str,
}

#[derive(Debug, PartialEq, Eq)]
pub struct TableSchema {
    pub name: &'static str,
    pub columns: &'static [ColumnDef],
    pub key: &'static [&'static str],
    pub foreign_keys: &'static [ForeignKey],
}

impl TableSchema {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Indices of the key columns, in key order
    pub fn key_indices(&self) -> Vec<usize> {
        self.key
            .iter()
            .filter_map(|k| self.column_index(k))
            .collect()
    }

    pub fn column_list(&self) -> String {
        self.columns
            .iter()
            .map(|c| c.name)
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn create_sql(&self) -> String {
        let mut parts: Vec<String> = self
            .columns
            .iter()
            .map(|c| {
                if c.nullable {
                    format!("{} {}", c.name, c.ty)
                } else {
                    format!("{} {} NOT NULL", c.name, c.ty)
                }
            })
            .collect();
        parts.push(format!("PRIMARY KEY ({})", self.key.join(", ")));
        for fk in self.foreign_keys {
            parts.push(format!(
                "FOREIGN KEY ({}) REFERENCES {}({})",
                fk.column, fk.table, fk.references
            ));
        }
        format!("CREATE TABLE IF NOT EXISTS {} (\n    {}\n)", self.name, parts.join(",\n    "))
    }
}

use ColumnType::{Date, Integer, Real, Text, Timestamp};

const COMMIT_FK: &[ForeignKey] = &[ForeignKey {
    column: "commit_hash",
    table: "commits",
    references: "hash",
}];

pub static COMMITS: TableSchema = TableSchema {
    name: "commits",
    columns: &[
        ColumnDef::required("hash", Text),
        ColumnDef::required("author", Text),
        ColumnDef::required("author_email", Text),
        ColumnDef::required("authored_at", Timestamp),
        ColumnDef::required("committer", Text),
        ColumnDef::required("committer_email", Text),
        ColumnDef::required("committed_at", Timestamp),
        // JSON array of hashes, first parent first
        ColumnDef::required("parents", Text),
        ColumnDef::required("message", Text),
    ],
    key: &["hash"],
    foreign_keys: &[],
};

pub static RELEASES: TableSchema = TableSchema {
    name: "releases",
    columns: &[
        ColumnDef::required("tag_name", Text),
        ColumnDef::required("commit_hash", Text),
    ],
    key: &["tag_name"],
    foreign_keys: COMMIT_FK,
};

pub static FILE_SIZES: TableSchema = TableSchema {
    name: "file_sizes",
    columns: &[
        ColumnDef::required("commit_hash", Text),
        ColumnDef::required("path", Text),
        ColumnDef::required("language", Text),
        ColumnDef::required("lines_of_code", Integer),
        ColumnDef::required("blank_lines", Integer),
        ColumnDef::required("comment_lines", Integer),
    ],
    key: &["commit_hash", "path"],
    foreign_keys: COMMIT_FK,
};

pub static FILE_SIZE_ERRORS: TableSchema = TableSchema {
    name: "file_size_errors",
    columns: &[
        ColumnDef::required("commit_hash", Text),
        ColumnDef::required("message", Text),
    ],
    key: &["commit_hash"],
    foreign_keys: COMMIT_FK,
};

/// One row per successfully counted commit, including commits with no
/// countable files
pub static FILE_SIZE_SAMPLES: TableSchema = TableSchema {
    name: "file_size_samples",
    columns: &[
        ColumnDef::required("commit_hash", Text),
        ColumnDef::required("file_count", Integer),
    ],
    key: &["commit_hash"],
    foreign_keys: COMMIT_FK,
};

pub static PROJECT_SIZE_PER_COMMIT: TableSchema = TableSchema {
    name: "project_size_per_commit",
    columns: &[
        ColumnDef::required("commit_hash", Text),
        ColumnDef::required("lines_of_code", Integer),
    ],
    key: &["commit_hash"],
    foreign_keys: &[],
};

pub static PROJECT_SIZE_PER_DAY: TableSchema = TableSchema {
    name: "project_size_per_day",
    columns: &[
        ColumnDef::required("day", Date),
        ColumnDef::required("lines_of_code", Integer),
        ColumnDef::required("commit_hash", Text),
    ],
    key: &["day"],
    foreign_keys: &[],
};

pub static PRODUCTIVITY_PER_COMMIT: TableSchema = TableSchema {
    name: "productivity_per_commit",
    columns: &[
        ColumnDef::required("commit_hash", Text),
        ColumnDef::required("churn", Integer),
        ColumnDef::required("delta", Integer),
    ],
    key: &["commit_hash"],
    foreign_keys: &[],
};

pub static PRODUCTIVITY_PER_DAY: TableSchema = TableSchema {
    name: "productivity_per_day",
    columns: &[
        ColumnDef::required("day", Date),
        ColumnDef::required("churn", Integer),
        ColumnDef::required("commit_count", Integer),
    ],
    key: &["day"],
    foreign_keys: &[],
};

pub static BUS_FACTOR_PER_DAY: TableSchema = TableSchema {
    name: "bus_factor_per_day",
    columns: &[
        ColumnDef::required("day", Date),
        ColumnDef::required("bus_factor", Integer),
        ColumnDef::required("author_count", Integer),
        ColumnDef::required("contribution", Text),
    ],
    key: &["day"],
    foreign_keys: &[],
};

const TRACKED_ITEM_COLUMNS: &[ColumnDef] = &[
    ColumnDef::required("id", Text),
    ColumnDef::required("number", Integer),
    ColumnDef::required("author", Text),
    ColumnDef::required("created_at", Timestamp),
    ColumnDef::optional("closed_at", Timestamp),
    ColumnDef::required("state", Text),
    // JSON array of label names
    ColumnDef::required("labels", Text),
];

pub static ISSUES: TableSchema = TableSchema {
    name: "issues",
    columns: TRACKED_ITEM_COLUMNS,
    key: &["id"],
    foreign_keys: &[],
};

pub static PULL_REQUESTS: TableSchema = TableSchema {
    name: "pull_requests",
    columns: TRACKED_ITEM_COLUMNS,
    key: &["id"],
    foreign_keys: &[],
};

const SPOILAGE_COLUMNS: &[ColumnDef] = &[
    ColumnDef::required("day", Date),
    ColumnDef::required("closed_count", Integer),
    ColumnDef::optional("mean_lifetime_seconds", Real),
];

pub static ISSUE_SPOILAGE_PER_DAY: TableSchema = TableSchema {
    name: "issue_spoilage_per_day",
    columns: SPOILAGE_COLUMNS,
    key: &["day"],
    foreign_keys: &[],
};

pub static PULL_REQUEST_SPOILAGE_PER_DAY: TableSchema = TableSchema {
    name: "pull_request_spoilage_per_day",
    columns: SPOILAGE_COLUMNS,
    key: &["day"],
    foreign_keys: &[],
};

pub static ISSUE_DENSITY_PER_DAY: TableSchema = TableSchema {
    name: "issue_density_per_day",
    columns: &[
        ColumnDef::required("day", Date),
        ColumnDef::required("open_issues", Integer),
        ColumnDef::required("kloc", Real),
        ColumnDef::optional("density", Real),
    ],
    key: &["day"],
    foreign_keys: &[],
};

/// Every table, in creation order (referenced tables first)
pub static ALL_TABLES: &[&TableSchema] = &[
    &COMMITS,
    &RELEASES,
    &FILE_SIZES,
    &FILE_SIZE_ERRORS,
    &FILE_SIZE_SAMPLES,
    &PROJECT_SIZE_PER_COMMIT,
    &PROJECT_SIZE_PER_DAY,
    &PRODUCTIVITY_PER_COMMIT,
    &PRODUCTIVITY_PER_DAY,
    &BUS_FACTOR_PER_DAY,
    &ISSUES,
    &PULL_REQUESTS,
    &ISSUE_SPOILAGE_PER_DAY,
    &PULL_REQUEST_SPOILAGE_PER_DAY,
    &ISSUE_DENSITY_PER_DAY,
];
