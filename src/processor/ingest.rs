//! Fixed-width `.dat` ingestion.
//!
//! Finds every `.dat` file under an extraction directory, parses each with an
//! inferred fixed-width layout and stacks the results row-wise.

use crate::constants::{DAT_EXTENSION, DEFAULT_INFER_ROWS};
use crate::error::{EtlError, Result};
use crate::processor::discovery::find_files_by_extension;
use crate::schema::{infer_schema, parse_fixed_width};
use polars::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Parser for directories of fixed-width instrument files
#[derive(Debug, Clone)]
pub struct FixedWidthIngester {
    infer_rows: usize,
}

impl Default for FixedWidthIngester {
    fn default() -> Self {
        Self::new(DEFAULT_INFER_ROWS)
    }
}

impl FixedWidthIngester {
    /// `infer_rows` data lines (after the header) are sampled for column boundaries
    pub fn new(infer_rows: usize) -> Self {
        Self {
            infer_rows: infer_rows.max(1),
        }
    }

    /// Parse one fixed-width file
    ///
    /// The first non-blank line is the header. Returns `None` for files with
    /// no header at all.
    pub fn read_file(&self, path: &Path) -> Result<Option<DataFrame>> {
        let text = fs::read_to_string(path)?;
        let mut lines = text.lines().filter(|l| !l.trim().is_empty());

        let Some(header) = lines.next() else {
            return Ok(None);
        };
        let data: Vec<&str> = lines.collect();

        let schema = infer_schema(header, &data, self.infer_rows);
        let df = parse_fixed_width(&data, &schema)?;
        debug!(
            "Parsed {} rows x {} columns from {}",
            df.height(),
            df.width(),
            path.display()
        );
        Ok(Some(df))
    }

    /// Parse every `.dat` file under `dir` and stack them into one table
    pub fn ingest_dir(&self, dir: &Path) -> Result<DataFrame> {
        let dat_files = find_files_by_extension(dir, DAT_EXTENSION, None)?;
        if dat_files.is_empty() {
            return Err(EtlError::FileNotFound {
                path: dir.to_path_buf(),
            });
        }

        let mut frames = Vec::with_capacity(dat_files.len());
        for path in dat_files {
            match self.read_file(&path)? {
                Some(df) => frames.push((path, df)),
                None => warn!("Skipping empty file {}", path.display()),
            }
        }

        if frames.is_empty() {
            return Err(EtlError::FileNotFound {
                path: dir.to_path_buf(),
            });
        }

        concat_frames(frames)
    }
}

fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect()
}

/// Type every frame's column can be cast to: numeric columns widen to
/// `Float64`, any other disagreement falls back to text
fn reconcile_dtype(dtypes: &[DataType]) -> DataType {
    let first = &dtypes[0];
    if dtypes.iter().all(|d| d == first) {
        return first.clone();
    }
    if dtypes
        .iter()
        .all(|d| matches!(d, DataType::Int64 | DataType::Float64))
    {
        DataType::Float64
    } else {
        DataType::String
    }
}

/// Stack tables vertically
///
/// Every table must carry the same set of column names; columns are aligned
/// to the order of the first table. Fails with [`EtlError::SchemaMismatch`]
/// naming the first file that disagrees.
pub fn concat_frames(frames: Vec<(PathBuf, DataFrame)>) -> Result<DataFrame> {
    let Some((_, first)) = frames.first() else {
        return Ok(DataFrame::empty());
    };
    let expected = column_names(first);
    let expected_set: HashSet<&str> = expected.iter().map(String::as_str).collect();

    let mut aligned = Vec::with_capacity(frames.len());
    for (path, df) in frames {
        let found = column_names(&df);
        let found_set: HashSet<&str> = found.iter().map(String::as_str).collect();
        if found.len() != expected.len() || found_set != expected_set {
            return Err(EtlError::SchemaMismatch {
                path,
                expected: expected.join(", "),
                found: found.join(", "),
            });
        }
        aligned.push(df.select(expected.iter().map(String::as_str))?);
    }

    for name in &expected {
        let dtypes: Vec<DataType> = aligned
            .iter()
            .map(|df| df.column(name).map(|c| c.dtype().clone()))
            .collect::<PolarsResult<_>>()?;
        let target = reconcile_dtype(&dtypes);
        for df in aligned.iter_mut() {
            if df.column(name)?.dtype() != &target {
                debug!("Casting column '{}' to {:?} for concatenation", name, target);
                let cast = df.column(name)?.cast(&target)?;
                df.with_column(cast)?;
            }
        }
    }

    let mut frames = aligned.into_iter();
    let Some(mut combined) = frames.next() else {
        return Ok(DataFrame::empty());
    };
    for df in frames {
        combined.vstack_mut(&df)?;
    }
    Ok(combined)
}
