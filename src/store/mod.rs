//! Schema-Checked Store
//!
//! A single-file SQLite database holding one table per entity. Every write
//! and every read passes through [`validate_batch`], and every write happens
//! inside one transaction so a failed stage leaves no partial output.

pub mod record;
pub mod records;
pub mod schema;
pub mod value;

pub use record::{validate_batch, Record};
pub use records::*;
pub use schema::{ColumnDef, ColumnType, TableSchema, ALL_TABLES};
pub use value::{Row, Value};

use log::{debug, info};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Transaction};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::day::DayBucketer;
use crate::error::{PipelineError, PipelineResult, ValidationError};
use record::key_string;

include!(concat!(env!("OUT_DIR"), "/schema_version.rs"));

const META_TABLE: &str = "prime_meta";

/// Handle to an opened, schema-compatible store
pub struct Store {
    conn: Connection,
    path: Option<PathBuf>,
    bucketer: DayBucketer,
}

impl Store {
    /// Open (creating if needed) the store at `path`.
    ///
    /// A fresh store is stamped with [`SCHEMA_VERSION`] and the reference
    /// offset of `bucketer`; an existing store must match both.
    pub fn open(path: impl AsRef<Path>, bucketer: DayBucketer) -> PipelineResult<Self> {
        let path = path.as_ref();
        debug!("Opening store at {}", path.display());

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::initialize(conn, Some(path.to_path_buf()), bucketer)
    }

    pub fn open_in_memory(bucketer: DayBucketer) -> PipelineResult<Self> {
        Self::initialize(Connection::open_in_memory()?, None, bucketer)
    }

    fn initialize(conn: Connection, path: Option<PathBuf>, bucketer: DayBucketer) -> PipelineResult<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        let store = Self { conn, path, bucketer };
        store.check_meta()?;
        for table in ALL_TABLES {
            store.conn.execute_batch(&table.create_sql())?;
            store.check_table_shape(table)?;
        }
        Ok(store)
    }

    fn check_meta(&self) -> PipelineResult<()> {
        self.conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {META_TABLE} (key TEXT NOT NULL PRIMARY KEY, value TEXT NOT NULL)"
        ))?;

        let expected = [
            ("schema_version", SCHEMA_VERSION.to_string()),
            ("utc_offset", self.bucketer.to_string()),
        ];
        for (key, value) in expected {
            let stored: Option<String> = self
                .conn
                .query_row(
                    &format!("SELECT value FROM {META_TABLE} WHERE key = ?1"),
                    params![key],
                    |row| row.get(0),
                )
                .optional()?;

            match stored {
                None => {
                    self.conn.execute(
                        &format!("INSERT INTO {META_TABLE} (key, value) VALUES (?1, ?2)"),
                        params![key, value],
                    )?;
                }
                Some(stored) if stored == value => {}
                Some(stored) => {
                    return Err(ValidationError::new(
                        META_TABLE,
                        key,
                        format!("store was created with {}, this run uses {}", stored, value),
                    )
                    .into())
                }
            }
        }
        Ok(())
    }

    fn check_table_shape(&self, table: &TableSchema) -> PipelineResult<()> {
        let mut stmt = self.conn.prepare(&format!("PRAGMA table_info({})", table.name))?;
        let actual = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>("name")?,
                    row.get::<_, String>("type")?,
                    row.get::<_, bool>("notnull")?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        if actual.len() != table.columns.len() {
            return Err(ValidationError::new(
                table.name,
                "*",
                format!("expected {} columns, store has {}", table.columns.len(), actual.len()),
            )
            .into());
        }

        for (column, (name, ty, not_null)) in table.columns.iter().zip(actual) {
            if column.name != name || !column.ty.sql_name().eq_ignore_ascii_case(&ty) || column.nullable == not_null {
                return Err(ValidationError::new(
                    table.name,
                    column.name,
                    format!(
                        "expected {} {}{}, store has {} {}{}",
                        column.name,
                        column.ty,
                        if column.nullable { "" } else { " NOT NULL" },
                        name,
                        ty,
                        if not_null { " NOT NULL" } else { "" },
                    ),
                )
                .into());
            }
        }
        Ok(())
    }

    pub fn bucketer(&self) -> DayBucketer {
        self.bucketer
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn row_count(&self, table: &TableSchema) -> PipelineResult<u64> {
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", table.name), [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    /// Fail with a missing-dependency error when `table` holds no rows
    pub fn require_populated(&self, stage: &str, table: &TableSchema) -> PipelineResult<()> {
        if self.row_count(table)? == 0 {
            return Err(PipelineError::missing_dependency(stage, table.name));
        }
        Ok(())
    }

    /// Read and validate every row of `R`'s table, ordered by key
    pub fn read_all<R: Record>(&self) -> PipelineResult<Vec<R>> {
        let schema = R::schema();
        let sql = format!(
            "SELECT {} FROM {} ORDER BY {}",
            schema.column_list(),
            schema.name,
            schema.key.join(", ")
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let raw_rows = stmt
            .query_map([], |row| {
                (0..schema.columns.len())
                    .map(|i| row.get::<_, rusqlite::types::Value>(i))
                    .collect::<Result<Vec<_>, _>>()
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut records = Vec::with_capacity(raw_rows.len());
        for (index, raw) in raw_rows.into_iter().enumerate() {
            let cells = raw
                .into_iter()
                .zip(schema.columns)
                .map(|(value, column)| Value::from_sql(value, schema.name, column))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| e.at_row(index))?;
            let row = Row::new(schema, cells).map_err(|e| e.at_row(index))?;
            records.push(R::from_row(row).map_err(|e| e.at_row(index))?);
        }

        validate_batch(&records)?;
        debug!("Read {} rows from {}", records.len(), schema.name);
        Ok(records)
    }

    /// Distinct values of a TEXT column
    pub fn distinct_text(&self, table: &TableSchema, column: &str) -> PipelineResult<HashSet<String>> {
        if table.column_index(column).is_none() {
            return Err(ValidationError::new(table.name, column, "no such column").into());
        }
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT DISTINCT {} FROM {}", column, table.name))?;
        let values = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(values)
    }

    /// Run `f` inside one transaction; any error rolls every write back
    pub fn transaction<T, F>(&mut self, f: F) -> PipelineResult<T>
    where
        F: FnOnce(&mut StoreWriter<'_>) -> PipelineResult<T>,
    {
        let tx = self.conn.transaction()?;
        let mut writer = StoreWriter { tx };
        let result = f(&mut writer)?;
        writer.tx.commit()?;
        Ok(result)
    }

    pub fn append<R: Record>(&mut self, records: &[R]) -> PipelineResult<usize> {
        self.transaction(|w| w.append(records))
    }

    pub fn replace<R: Record>(&mut self, records: &[R]) -> PipelineResult<usize> {
        self.transaction(|w| w.replace(records))
    }
}

/// Write access to the store within an open transaction
pub struct StoreWriter<'a> {
    tx: Transaction<'a>,
}

impl StoreWriter<'_> {
    /// Append immutable facts. A key that is already stored, or a reference
    /// to a row that does not exist, fails the whole batch.
    pub fn append<R: Record>(&mut self, records: &[R]) -> PipelineResult<usize> {
        let schema = R::schema();
        let rows = validate_batch(records)?;

        let key_indices = schema.key_indices();
        let key_sql = format!(
            "SELECT 1 FROM {} WHERE {}",
            schema.name,
            schema
                .key
                .iter()
                .enumerate()
                .map(|(i, k)| format!("{} = ?{}", k, i + 1))
                .collect::<Vec<_>>()
                .join(" AND ")
        );
        for (index, row) in rows.iter().enumerate() {
            let key_cells = key_indices.iter().map(|&i| &row[i]);
            let exists = self
                .tx
                .prepare_cached(&key_sql)?
                .query_row(params_from_iter(key_cells), |_| Ok(()))
                .optional()?
                .is_some();
            if exists {
                return Err(ValidationError::new(
                    schema.name,
                    schema.key.join(", "),
                    format!("duplicate key {}", key_string(schema, row)),
                )
                .at_row(index)
                .into());
            }
        }

        for fk in schema.foreign_keys {
            let Some(column) = schema.column_index(fk.column) else {
                continue;
            };
            let sql = format!("SELECT 1 FROM {} WHERE {} = ?1", fk.table, fk.references);
            for (index, row) in rows.iter().enumerate() {
                let found = self
                    .tx
                    .prepare_cached(&sql)?
                    .query_row([&row[column]], |_| Ok(()))
                    .optional()?
                    .is_some();
                if !found {
                    return Err(ValidationError::new(
                        schema.name,
                        fk.column,
                        format!("references missing {}.{} '{}'", fk.table, fk.references, row[column]),
                    )
                    .at_row(index)
                    .into());
                }
            }
        }

        self.insert_rows(schema, &rows)
    }

    /// Replace the whole contents of a derived table
    pub fn replace<R: Record>(&mut self, records: &[R]) -> PipelineResult<usize> {
        let schema = R::schema();
        let rows = validate_batch(records)?;
        let removed = self.tx.execute(&format!("DELETE FROM {}", schema.name), [])?;
        if removed > 0 {
            debug!("Cleared {} previous rows from {}", removed, schema.name);
        }
        self.insert_rows(schema, &rows)
    }

    fn insert_rows(&mut self, schema: &TableSchema, rows: &[Vec<Value>]) -> PipelineResult<usize> {
        let placeholders = (1..=schema.columns.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            schema.name,
            schema.column_list(),
            placeholders
        );
        let mut stmt = self.tx.prepare_cached(&sql)?;
        for row in rows {
            stmt.execute(params_from_iter(row.iter()))?;
        }
        info!("Wrote {} rows to {}", rows.len(), schema.name);
        Ok(rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    const H1: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const H2: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    fn commit(hash: &str) -> Commit {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        Commit {
            hash: hash.to_string(),
            author: "Alice".to_string(),
            author_email: "alice@example.com".to_string(),
            authored_at: at,
            committer: "Alice".to_string(),
            committer_email: "alice@example.com".to_string(),
            committed_at: at,
            parents: vec![],
            message: "message".to_string(),
        }
    }

    #[test]
    fn test_round_trip_through_store() {
        let mut store = Store::open_in_memory(DayBucketer::utc()).unwrap();
        store.append(&[commit(H2), commit(H1)]).unwrap();

        let commits: Vec<Commit> = store.read_all().unwrap();
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].hash, H1);
        assert_eq!(commits[0], commit(H1));
    }

    #[test]
    fn test_append_rejects_stored_duplicates_without_writing() {
        let mut store = Store::open_in_memory(DayBucketer::utc()).unwrap();
        store.append(&[commit(H1)]).unwrap();

        let err = store.append(&[commit(H2), commit(H1)]).unwrap_err();
        match err {
            PipelineError::Validation(v) => {
                assert_eq!(v.table, "commits");
                assert_eq!(v.row, Some(1));
                assert!(v.reason.contains("duplicate key"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.row_count(&schema::COMMITS).unwrap(), 1);
    }

    #[test]
    fn test_append_rejects_dangling_release() {
        let mut store = Store::open_in_memory(DayBucketer::utc()).unwrap();
        let release = Release {
            tag_name: "v1.0".to_string(),
            commit_hash: H1.to_string(),
        };
        let err = store.append(&[release]).unwrap_err();
        assert!(matches!(err, PipelineError::Validation(ref v) if v.field == "commit_hash"));
    }

    #[test]
    fn test_transaction_rolls_back_earlier_tables() {
        let mut store = Store::open_in_memory(DayBucketer::utc()).unwrap();
        let bad = FileSize {
            commit_hash: H1.to_string(),
            path: String::new(),
            language: "Rust".to_string(),
            lines_of_code: 1,
            blank_lines: 0,
            comment_lines: 0,
        };
        let result = store.transaction(|w| {
            w.append(&[commit(H1)])?;
            w.append(&[bad])
        });
        assert!(result.is_err());
        assert_eq!(store.row_count(&schema::COMMITS).unwrap(), 0);
    }

    #[test]
    fn test_replace_is_row_set_stable() {
        let mut store = Store::open_in_memory(DayBucketer::utc()).unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let rows = vec![ProductivityPerDay { day, churn: 10, commit_count: 2 }];

        store.replace(&rows).unwrap();
        store.replace(&rows).unwrap();
        let stored: Vec<ProductivityPerDay> = store.read_all().unwrap();
        assert_eq!(stored, rows);
    }

    #[test]
    fn test_require_populated() {
        let mut store = Store::open_in_memory(DayBucketer::utc()).unwrap();
        let err = store.require_populated("bus-factor", &schema::COMMITS).unwrap_err();
        assert!(matches!(err, PipelineError::MissingDependency { .. }));

        store.append(&[commit(H1)]).unwrap();
        assert!(store.require_populated("bus-factor", &schema::COMMITS).is_ok());
    }

    #[test]
    fn test_reopen_with_other_offset_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("prime.db");
        drop(Store::open(&path, DayBucketer::utc()).unwrap());

        let other: DayBucketer = "+02:00".parse().unwrap();
        let err = Store::open(&path, other).err().unwrap();
        assert!(matches!(err, PipelineError::Validation(ref v) if v.field == "utc_offset"));

        assert!(Store::open(&path, DayBucketer::utc()).is_ok());
    }

    #[test]
    fn test_incompatible_table_shape_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("prime.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch("CREATE TABLE commits (hash TEXT NOT NULL PRIMARY KEY, author INTEGER)")
                .unwrap();
        }
        let err = Store::open(&path, DayBucketer::utc()).err().unwrap();
        assert!(matches!(err, PipelineError::Validation(ref v) if v.table == "commits"));
    }

    #[test]
    fn test_read_validates_persisted_rows() {
        let mut store = Store::open_in_memory(DayBucketer::utc()).unwrap();
        store.append(&[commit(H1)]).unwrap();
        store
            .conn
            .execute("INSERT INTO project_size_per_commit VALUES (?1, -5)", params![H1])
            .unwrap();

        let err = store.read_all::<ProjectSizePerCommit>().unwrap_err();
        assert!(matches!(err, PipelineError::Validation(ref v) if v.field == "lines_of_code"));
    }
}
