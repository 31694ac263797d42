//! SQLite sink for normalized tables.
//!
//! Appends tables to a named table inside a schema (`main` or an attached
//! database), creating it on first write with column types inferred from the
//! table. Writes are append-only and grouped into batches, each committed in
//! its own transaction: a failure part way through leaves the earlier batches
//! written. Writing the same table twice stores its rows twice.

use crate::error::{EtlError, Result};
use crate::processor::normalize::{date_values, datetime_values, prepare_batch, time_values};
use crate::schema::{SqlType, sql_column_types};
use polars::prelude::*;
use regex::Regex;
use rusqlite::types::Value;
use rusqlite::{Connection, params_from_iter};
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, info};

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid")
});

/// Reject schema and table names that are not plain identifiers
///
/// Schema names cannot be bound as query parameters, so every name is checked
/// before it is spliced into SQL.
pub fn validate_identifier(identifier: &str) -> Result<()> {
    if IDENTIFIER.is_match(identifier) {
        Ok(())
    } else {
        Err(EtlError::InvalidIdentifier {
            identifier: identifier.to_string(),
        })
    }
}

fn quoted(schema: &str, table: &str) -> String {
    format!("\"{}\".\"{}\"", schema, table)
}

/// Append-only writer over a SQLite connection
#[derive(Debug)]
pub struct SqlSink {
    conn: Connection,
}

impl SqlSink {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Open (or create) a database file
    pub fn open(path: &Path) -> Result<Self> {
        debug!("Opening database {}", path.display());
        Ok(Self::new(Connection::open(path)?))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Connection::open_in_memory()?))
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Attach another database file under the schema name `name`
    pub fn attach_schema(&self, name: &str, path: &Path) -> Result<()> {
        validate_identifier(name)?;
        self.conn.execute(
            &format!("ATTACH DATABASE ?1 AS \"{}\"", name),
            [path.to_string_lossy().into_owned()],
        )?;
        Ok(())
    }

    /// Check whether `schema` names the main, temp or an attached database
    pub fn schema_exists(&self, schema: &str) -> Result<bool> {
        validate_identifier(schema)?;
        if schema.eq_ignore_ascii_case("temp") {
            return Ok(true);
        }
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM pragma_database_list WHERE name = ?1 COLLATE NOCASE)",
            [schema],
            |row| row.get(0),
        )?;
        Ok(exists != 0)
    }

    /// Check whether `table` is registered in the catalog of `schema`
    ///
    /// An unknown schema holds no tables.
    pub fn table_exists(&self, schema: &str, table: &str) -> Result<bool> {
        validate_identifier(table)?;
        if !self.schema_exists(schema)? {
            return Ok(false);
        }
        let query = format!(
            "SELECT EXISTS (SELECT 1 FROM \"{}\".sqlite_master WHERE type = 'table' AND name = ?1)",
            schema
        );
        let exists: i64 = self.conn.query_row(&query, [table], |row| row.get(0))?;
        Ok(exists != 0)
    }

    /// Number of rows currently stored in `schema.table`
    pub fn row_count(&self, schema: &str, table: &str) -> Result<usize> {
        validate_identifier(schema)?;
        validate_identifier(table)?;
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quoted(schema, table)),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Append `chunk` to `schema.table` in groups of at most `batch_size` rows
    ///
    /// Creates the table when it does not exist. Returns the number of rows
    /// written.
    pub fn write_chunk(
        &mut self,
        chunk: &DataFrame,
        table: &str,
        schema: &str,
        batch_size: usize,
    ) -> Result<usize> {
        validate_identifier(schema)?;
        validate_identifier(table)?;
        if batch_size == 0 {
            return Err(EtlError::Configuration {
                message: "batch size must be greater than zero".to_string(),
            });
        }

        let column_types = sql_column_types(chunk);
        if column_types.is_empty() {
            return Err(EtlError::Configuration {
                message: format!("cannot write a table with no columns to {}.{}", schema, table),
            });
        }

        self.create_table(schema, table, &column_types)?;

        let values: Vec<Vec<Value>> = chunk
            .get_columns()
            .iter()
            .map(column_values)
            .collect::<Result<_>>()?;

        let column_list: Vec<String> = column_types
            .iter()
            .map(|(name, _)| format!("\"{}\"", name.replace('"', "\"\"")))
            .collect();
        let placeholders: Vec<String> = (1..=column_types.len()).map(|i| format!("?{}", i)).collect();
        let insert = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quoted(schema, table),
            column_list.join(", "),
            placeholders.join(", ")
        );

        let total = chunk.height();
        let mut written = 0;
        for batch_start in (0..total).step_by(batch_size) {
            let batch_end = (batch_start + batch_size).min(total);
            let tx = self.conn.transaction()?;
            {
                let mut stmt = tx.prepare_cached(&insert)?;
                for row in batch_start..batch_end {
                    stmt.execute(params_from_iter(values.iter().map(|column| &column[row])))?;
                }
            }
            tx.commit()?;
            written += batch_end - batch_start;
            debug!(
                "Wrote rows {}..{} of {} to {}.{}",
                batch_start, batch_end, total, schema, table
            );
        }

        info!("Appended {} rows to {}.{}", written, schema, table);
        Ok(written)
    }

    /// Derive `datetime` from `date` + `time`, drop the parts, then append
    pub fn write_and_clean_chunk(
        &mut self,
        chunk: DataFrame,
        table: &str,
        schema: &str,
        batch_size: usize,
    ) -> Result<usize> {
        let chunk = prepare_batch(chunk)?;
        self.write_chunk(&chunk, table, schema, batch_size)
    }

    fn create_table(&self, schema: &str, table: &str, columns: &[(String, SqlType)]) -> Result<()> {
        if self.table_exists(schema, table)? {
            return Ok(());
        }

        let definitions: Vec<String> = columns
            .iter()
            .map(|(name, sql_type)| format!("\"{}\" {}", name.replace('"', "\"\""), sql_type.as_sql()))
            .collect();
        self.conn.execute(
            &format!(
                "CREATE TABLE {} ({})",
                quoted(schema, table),
                definitions.join(", ")
            ),
            [],
        )?;
        info!("Created table {}.{}", schema, table);
        Ok(())
    }
}

fn text_or_null<T>(value: Option<T>, format: impl Fn(T) -> String) -> Value {
    value.map_or(Value::Null, |v| Value::Text(format(v)))
}

/// Convert one column into SQLite values; temporal columns become ISO-8601 text
fn column_values(column: &Column) -> Result<Vec<Value>> {
    let values = match column.dtype() {
        DataType::Datetime(..) => datetime_values(column)?
            .into_iter()
            .map(|v| text_or_null(v, |dt| dt.format("%Y-%m-%d %H:%M:%S%.f").to_string()))
            .collect(),
        DataType::Date => date_values(column)?
            .into_iter()
            .map(|v| text_or_null(v, |d| d.format("%Y-%m-%d").to_string()))
            .collect(),
        DataType::Time => time_values(column)?
            .into_iter()
            .map(|v| text_or_null(v, |t| t.format("%H:%M:%S%.f").to_string()))
            .collect(),
        dtype => match SqlType::from_polars(dtype) {
            SqlType::Integer => column
                .cast(&DataType::Int64)?
                .as_materialized_series()
                .i64()?
                .into_iter()
                .map(|v| v.map_or(Value::Null, Value::Integer))
                .collect(),
            SqlType::Real => column
                .cast(&DataType::Float64)?
                .as_materialized_series()
                .f64()?
                .into_iter()
                .map(|v| v.map_or(Value::Null, Value::Real))
                .collect(),
            SqlType::Text => column
                .cast(&DataType::String)?
                .as_materialized_series()
                .str()?
                .into_iter()
                .map(|v| v.map_or(Value::Null, |s| Value::Text(s.to_string())))
                .collect(),
        },
    };
    Ok(values)
}
