//! Schema inference for fixed-width files and SQL tables.
//!
//! Column boundaries of a fixed-width file are inferred from whitespace
//! alignment across a sample of lines, column types from the values, and SQL
//! column types from a parsed [`DataFrame`]. Inference is kept apart from
//! parsing so each can be exercised with synthetic samples.

use crate::error::Result;
use polars::prelude::*;
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

/// Value type inferred for a fixed-width column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Int64,
    Float64,
    String,
}

impl ColumnType {
    /// Narrowest type every non-empty value fits
    ///
    /// A column with no values at all is an all-null `Float64`, so it stacks
    /// with numeric columns of other files.
    fn infer<'a>(values: impl Iterator<Item = &'a str>) -> Self {
        let mut inferred = ColumnType::Int64;
        let mut seen_value = false;

        for value in values.filter(|v| !v.is_empty()) {
            seen_value = true;
            if inferred == ColumnType::Int64 && value.parse::<i64>().is_err() {
                inferred = ColumnType::Float64;
            }
            if inferred == ColumnType::Float64 && value.parse::<f64>().is_err() {
                return ColumnType::String;
            }
        }

        if seen_value {
            inferred
        } else {
            ColumnType::Float64
        }
    }
}

/// One column of a fixed-width layout, in character positions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub start: usize,
    /// Exclusive end; `None` runs to the end of the line
    pub end: Option<usize>,
    pub dtype: ColumnType,
}

impl ColumnSpec {
    /// Cut this column's cell out of a line, trimmed
    pub fn slice<'a>(&self, line: &'a str) -> &'a str {
        let start = byte_offset(line, self.start);
        let end = self.end.map_or(line.len(), |end| byte_offset(line, end));
        line[start..end.max(start)].trim()
    }
}

/// Inferred layout of a fixed-width file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedWidthSchema {
    pub columns: Vec<ColumnSpec>,
}

impl FixedWidthSchema {
    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

impl fmt::Display for FixedWidthSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("{}:{:?}", c.name, c.dtype))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// Byte offset of the `chars`-th character, clamped to the line length
fn byte_offset(line: &str, chars: usize) -> usize {
    line.char_indices()
        .nth(chars)
        .map_or(line.len(), |(offset, _)| offset)
}

/// Infer `[start, end)` character ranges of columns from aligned lines
///
/// A position belongs to a column when any sampled line has a non-whitespace
/// character there; each maximal run of such positions is one column. The
/// last column is left open-ended so longer unsampled lines are not cut.
pub fn infer_colspecs(lines: &[&str]) -> Vec<(usize, Option<usize>)> {
    let width = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
    let mut occupied = vec![false; width];
    for line in lines {
        for (pos, ch) in line.chars().enumerate() {
            if !ch.is_whitespace() {
                occupied[pos] = true;
            }
        }
    }

    let mut specs = Vec::new();
    let mut run_start = None;
    for (pos, &filled) in occupied.iter().enumerate() {
        match (filled, run_start) {
            (true, None) => run_start = Some(pos),
            (false, Some(start)) => {
                specs.push((start, Some(pos)));
                run_start = None;
            }
            _ => {}
        }
    }
    if let Some(start) = run_start {
        specs.push((start, Some(width)));
    }

    if let Some(last) = specs.last_mut() {
        last.1 = None;
    }
    specs
}

/// Infer the layout and column types of a fixed-width file
///
/// `header` names the columns. Boundaries come from the header plus the first
/// `infer_rows` data lines; types are inferred over every data line.
pub fn infer_schema(header: &str, data: &[&str], infer_rows: usize) -> FixedWidthSchema {
    let mut sample = Vec::with_capacity(infer_rows.min(data.len()) + 1);
    sample.push(header);
    sample.extend(data.iter().take(infer_rows).copied());

    let mut seen = HashSet::new();
    let columns: Vec<ColumnSpec> = infer_colspecs(&sample)
        .into_iter()
        .enumerate()
        .map(|(index, (start, end))| {
            let mut spec = ColumnSpec {
                name: String::new(),
                start,
                end,
                dtype: ColumnType::String,
            };
            spec.name = unique_name(spec.slice(header), index, &mut seen);
            spec.dtype = ColumnType::infer(data.iter().map(|line| spec.slice(line)));
            spec
        })
        .collect();

    let schema = FixedWidthSchema { columns };
    debug!("Inferred fixed-width schema: {}", schema);
    schema
}

/// Header label for a column; blanks become `unnamed_<index>` and repeats
/// get a `.<n>` suffix
fn unique_name(raw: &str, index: usize, seen: &mut HashSet<String>) -> String {
    let base = if raw.is_empty() {
        format!("unnamed_{}", index)
    } else {
        raw.to_string()
    };

    let mut name = base.clone();
    let mut suffix = 1;
    while !seen.insert(name.clone()) {
        name = format!("{}.{}", base, suffix);
        suffix += 1;
    }
    name
}

/// Build a table from data lines using an inferred layout
///
/// Empty cells, and cells that do not parse as the column type, become null.
pub fn parse_fixed_width(data: &[&str], schema: &FixedWidthSchema) -> Result<DataFrame> {
    let columns: Vec<Column> = schema
        .columns
        .iter()
        .map(|spec| {
            let cells = data.iter().map(|line| Some(spec.slice(line)).filter(|c| !c.is_empty()));
            let name = PlSmallStr::from(spec.name.as_str());
            let series = match spec.dtype {
                ColumnType::Int64 => Series::new(
                    name,
                    cells.map(|c| c.and_then(|v| v.parse::<i64>().ok())).collect::<Vec<_>>(),
                ),
                ColumnType::Float64 => Series::new(
                    name,
                    cells.map(|c| c.and_then(|v| v.parse::<f64>().ok())).collect::<Vec<_>>(),
                ),
                ColumnType::String => Series::new(name, cells.collect::<Vec<Option<&str>>>()),
            };
            Column::from(series)
        })
        .collect();

    Ok(DataFrame::new(columns)?)
}

/// Storage class used when creating SQL tables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Integer,
    Real,
    Text,
}

impl SqlType {
    pub fn as_sql(self) -> &'static str {
        match self {
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
            SqlType::Text => "TEXT",
        }
    }

    pub fn from_polars(dtype: &DataType) -> Self {
        if dtype.is_bool() || dtype.is_integer() {
            SqlType::Integer
        } else if dtype.is_float() {
            SqlType::Real
        } else {
            // Timestamps are stored as ISO-8601 text
            SqlType::Text
        }
    }
}

/// SQL column name and type for every column of a table
pub fn sql_column_types(df: &DataFrame) -> Vec<(String, SqlType)> {
    df.get_columns()
        .iter()
        .map(|c| (c.name().to_string(), SqlType::from_polars(c.dtype())))
        .collect()
}
