//! Core data structures shared by the pipeline stages.
//!
//! Defines the date window used for discovery, discovered archive paths,
//! the nested path tree produced by multi-directory discovery, and the
//! selectable discovery and normalization modes.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Closed calendar interval `[start, end]` selected by a date token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateInterval {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateInterval {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Check whether a single date falls inside the interval (inclusive)
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Check whether `[from, to]` shares at least one day with the interval
    ///
    /// A reversed interval is empty and overlaps nothing.
    pub fn overlaps(&self, from: NaiveDate, to: NaiveDate) -> bool {
        self.start <= self.end && from <= self.end && self.start <= to
    }
}

impl fmt::Display for DateInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// A file found during discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    pub extension: String,
}

impl DiscoveredFile {
    pub fn new(path: PathBuf, extension: impl Into<String>) -> Self {
        Self {
            path,
            extension: extension.into(),
        }
    }
}

/// Arbitrarily nested sequence of items
///
/// Produced when discovery runs over several base directories, each of
/// which may itself yield a list of lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Nested<T> {
    Leaf(T),
    Branch(Vec<Nested<T>>),
}

impl<T> From<T> for Nested<T> {
    fn from(item: T) -> Self {
        Nested::Leaf(item)
    }
}

/// How archives are located under a base directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryStrategy {
    /// Keep only `YYYYMM` subdirectories inside the window, then collect by extension
    #[default]
    Pruned,
    /// Walk the whole tree and match dates embedded in file names
    Flat,
}

/// How column labels and timestamps are cleaned after ingestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum NormalizeMode {
    /// Leave the ingested table untouched
    None,
    /// Snake-case column labels only
    Minimal,
    /// Snake-case labels, derive `datetime`, reorder and sort descending
    #[default]
    Full,
}

/// Outcome of loading a set of archives into the SQL sink
#[derive(Debug, Default)]
pub struct LoadSummary {
    pub archives_found: usize,
    pub archives_loaded: usize,
    pub archives_failed: usize,
    pub rows_written: usize,
    pub processing_time_ms: u128,
}
