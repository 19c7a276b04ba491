//! Typed store cells

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};
use std::fmt;

use super::schema::{ColumnDef, ColumnType, TableSchema};
use crate::error::ValidationError;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// A single cell of a record, tagged with its logical column type
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
}

impl Value {
    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            Value::Null => None,
            Value::Integer(_) => Some(ColumnType::Integer),
            Value::Real(_) => Some(ColumnType::Real),
            Value::Text(_) => Some(ColumnType::Text),
            Value::Timestamp(_) => Some(ColumnType::Timestamp),
            Value::Date(_) => Some(ColumnType::Date),
        }
    }

    pub fn opt_timestamp(value: Option<DateTime<Utc>>) -> Self {
        value.map_or(Value::Null, Value::Timestamp)
    }

    pub fn opt_real(value: Option<f64>) -> Self {
        value.map_or(Value::Null, Value::Real)
    }

    /// Decode a raw SQLite value stored in `column` of `table`
    pub fn from_sql(raw: SqlValue, table: &str, column: &ColumnDef) -> Result<Self, ValidationError> {
        let mismatch = |found: &str| {
            ValidationError::new(table, column.name, format!("expected {}, found {}", column.ty, found))
        };

        match (column.ty, raw) {
            (_, SqlValue::Null) if column.nullable => Ok(Value::Null),
            (_, SqlValue::Null) => Err(ValidationError::new(table, column.name, "must not be null")),
            (ColumnType::Integer, SqlValue::Integer(i)) => Ok(Value::Integer(i)),
            (ColumnType::Real, SqlValue::Real(f)) => Ok(Value::Real(f)),
            (ColumnType::Real, SqlValue::Integer(i)) => Ok(Value::Real(i as f64)),
            (ColumnType::Text, SqlValue::Text(s)) => Ok(Value::Text(s)),
            (ColumnType::Timestamp, SqlValue::Text(s)) => DateTime::parse_from_rfc3339(&s)
                .map(|t| Value::Timestamp(t.with_timezone(&Utc)))
                .map_err(|e| ValidationError::new(table, column.name, format!("invalid timestamp '{}': {}", s, e))),
            (ColumnType::Date, SqlValue::Text(s)) => NaiveDate::parse_from_str(&s, DATE_FORMAT)
                .map(Value::Date)
                .map_err(|e| ValidationError::new(table, column.name, format!("invalid date '{}': {}", s, e))),
            (_, SqlValue::Integer(_)) => Err(mismatch("INTEGER")),
            (_, SqlValue::Real(_)) => Err(mismatch("REAL")),
            (_, SqlValue::Text(_)) => Err(mismatch("TEXT")),
            (_, SqlValue::Blob(_)) => Err(mismatch("BLOB")),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{}", r),
            Value::Text(s) => f.write_str(s),
            Value::Timestamp(t) => f.write_str(&format_timestamp(t)),
            Value::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Integer(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Value::Real(r) => ToSqlOutput::Owned(SqlValue::Real(*r)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Timestamp(t) => ToSqlOutput::Owned(SqlValue::Text(format_timestamp(t))),
            Value::Date(d) => ToSqlOutput::Owned(SqlValue::Text(d.format(DATE_FORMAT).to_string())),
        })
    }
}

pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Check a row of cells against the column list of `schema`
pub fn validate_cells(schema: &TableSchema, cells: &[Value]) -> Result<(), ValidationError> {
    if cells.len() != schema.columns.len() {
        return Err(ValidationError::new(
            schema.name,
            "*",
            format!("expected {} columns, found {}", schema.columns.len(), cells.len()),
        ));
    }

    for (column, cell) in schema.columns.iter().zip(cells) {
        match cell.column_type() {
            None if column.nullable => {}
            None => return Err(ValidationError::new(schema.name, column.name, "must not be null")),
            Some(ty) if ty != column.ty => {
                return Err(ValidationError::new(
                    schema.name,
                    column.name,
                    format!("expected {}, found {}", column.ty, ty),
                ))
            }
            Some(_) => {}
        }
        if let Value::Real(r) = cell {
            if !r.is_finite() {
                return Err(ValidationError::new(schema.name, column.name, "must be a finite number"));
            }
        }
    }
    Ok(())
}

/// Named access to the cells of one row while rebuilding a record
pub struct Row {
    schema: &'static TableSchema,
    cells: Vec<Value>,
}

impl Row {
    pub fn new(schema: &'static TableSchema, cells: Vec<Value>) -> Result<Self, ValidationError> {
        validate_cells(schema, &cells)?;
        Ok(Self { schema, cells })
    }

    fn take(&mut self, name: &str) -> Result<Value, ValidationError> {
        let index = self
            .schema
            .column_index(name)
            .ok_or_else(|| ValidationError::new(self.schema.name, name, "no such column"))?;
        Ok(std::mem::replace(&mut self.cells[index], Value::Null))
    }

    fn mismatch(&self, name: &str, expected: &str) -> ValidationError {
        ValidationError::new(self.schema.name, name, format!("expected {}", expected))
    }

    pub fn text(&mut self, name: &str) -> Result<String, ValidationError> {
        match self.take(name)? {
            Value::Text(s) => Ok(s),
            _ => Err(self.mismatch(name, "TEXT")),
        }
    }

    pub fn integer(&mut self, name: &str) -> Result<i64, ValidationError> {
        match self.take(name)? {
            Value::Integer(i) => Ok(i),
            _ => Err(self.mismatch(name, "INTEGER")),
        }
    }

    pub fn opt_real(&mut self, name: &str) -> Result<Option<f64>, ValidationError> {
        match self.take(name)? {
            Value::Real(r) => Ok(Some(r)),
            Value::Null => Ok(None),
            _ => Err(self.mismatch(name, "REAL")),
        }
    }

    pub fn real(&mut self, name: &str) -> Result<f64, ValidationError> {
        self.opt_real(name)?
            .ok_or_else(|| self.mismatch(name, "REAL"))
    }

    pub fn opt_timestamp(&mut self, name: &str) -> Result<Option<DateTime<Utc>>, ValidationError> {
        match self.take(name)? {
            Value::Timestamp(t) => Ok(Some(t)),
            Value::Null => Ok(None),
            _ => Err(self.mismatch(name, "TIMESTAMP")),
        }
    }

    pub fn timestamp(&mut self, name: &str) -> Result<DateTime<Utc>, ValidationError> {
        self.opt_timestamp(name)?
            .ok_or_else(|| self.mismatch(name, "TIMESTAMP"))
    }

    pub fn date(&mut self, name: &str) -> Result<NaiveDate, ValidationError> {
        match self.take(name)? {
            Value::Date(d) => Ok(d),
            _ => Err(self.mismatch(name, "DATE")),
        }
    }

    /// A TEXT cell holding a JSON array of strings
    pub fn string_list(&mut self, name: &str) -> Result<Vec<String>, ValidationError> {
        let raw = self.text(name)?;
        serde_json::from_str(&raw).map_err(|e| {
            ValidationError::new(self.schema.name, name, format!("expected a JSON string array: {}", e))
        })
    }
}

/// Encode a list of strings for a JSON array TEXT cell
pub fn string_list(items: &[String]) -> Value {
    Value::Text(serde_json::Value::from(items.to_vec()).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::schema::{ISSUES, PROJECT_SIZE_PER_DAY};
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_text_has_second_precision() {
        let t = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        assert_eq!(format_timestamp(&t), "2024-05-06T07:08:09Z");
        assert_eq!(Value::Timestamp(t).to_string(), "2024-05-06T07:08:09Z");
    }

    #[test]
    fn test_from_sql_rejects_wrong_types() {
        let column = ColumnDef::required("lines_of_code", ColumnType::Integer);
        let err = Value::from_sql(SqlValue::Text("ten".into()), "t", &column).unwrap_err();
        assert_eq!(err.field, "lines_of_code");
        assert!(err.reason.contains("expected INTEGER, found TEXT"));

        let err = Value::from_sql(SqlValue::Null, "t", &column).unwrap_err();
        assert_eq!(err.reason, "must not be null");
    }

    #[test]
    fn test_from_sql_parses_dates_and_timestamps() {
        let day = ColumnDef::required("day", ColumnType::Date);
        assert_eq!(
            Value::from_sql(SqlValue::Text("2024-02-29".into()), "t", &day).unwrap(),
            Value::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())
        );
        assert!(Value::from_sql(SqlValue::Text("29/02/2024".into()), "t", &day).is_err());

        let at = ColumnDef::optional("closed_at", ColumnType::Timestamp);
        assert_eq!(Value::from_sql(SqlValue::Null, "t", &at).unwrap(), Value::Null);
        assert_eq!(
            Value::from_sql(SqlValue::Text("2024-01-01T10:00:00+02:00".into()), "t", &at).unwrap(),
            Value::Timestamp(Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_validate_cells_checks_arity_types_and_nulls() {
        let day = Value::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        let ok = vec![day.clone(), Value::Integer(10), Value::Text("abc".into())];
        assert!(validate_cells(&PROJECT_SIZE_PER_DAY, &ok).is_ok());

        let short = vec![day.clone(), Value::Integer(10)];
        assert!(validate_cells(&PROJECT_SIZE_PER_DAY, &short).is_err());

        let null = vec![day.clone(), Value::Null, Value::Text("abc".into())];
        let err = validate_cells(&PROJECT_SIZE_PER_DAY, &null).unwrap_err();
        assert_eq!(err.field, "lines_of_code");

        let wrong = vec![day, Value::Real(1.0), Value::Text("abc".into())];
        let err = validate_cells(&PROJECT_SIZE_PER_DAY, &wrong).unwrap_err();
        assert!(err.reason.contains("expected INTEGER, found REAL"));
    }

    #[test]
    fn test_row_accessors_and_string_lists() {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let labels = vec!["bug".to_string(), "needs, triage".to_string()];
        let cells = vec![
            Value::Text("I_1".into()),
            Value::Integer(1),
            Value::Text("octocat".into()),
            Value::Timestamp(created),
            Value::Null,
            Value::Text("OPEN".into()),
            string_list(&labels),
        ];
        let mut row = Row::new(&ISSUES, cells).unwrap();
        assert_eq!(row.text("id").unwrap(), "I_1");
        assert_eq!(row.timestamp("created_at").unwrap(), created);
        assert_eq!(row.opt_timestamp("closed_at").unwrap(), None);
        assert_eq!(row.string_list("labels").unwrap(), labels);
        assert!(row.integer("no_such_column").is_err());
    }
}
