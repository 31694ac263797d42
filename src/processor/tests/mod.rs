//! Pipeline tests for the processor module
//!
//! Build zip archives of fixed-width files in temporary directories and run
//! them through extraction, ingestion, normalization and the SQL sink.

pub mod basic_processing;

use crate::models::DiscoveredFile;
use crate::processor::extract::tests::write_zip;
use std::path::Path;

pub(crate) const FLUX_JAN_01: &str = "\
Date       Time          Flux
2023-01-01 00:00:00.000  1.5
2023-01-01 00:30:00.000  2.5
";

pub(crate) const FLUX_JAN_02: &str = "\
Date       Time          Flux
2023-01-02 00:00:00.000  3.5
2023-01-02 00:30:00.000  4.5
2023-01-02 01:00:00.000  5.5
";

/// Write `name` into `dir` holding the given `.dat` entries
pub(crate) fn archive(dir: &Path, name: &str, entries: &[(&str, &str)]) -> DiscoveredFile {
    let path = dir.join(name);
    write_zip(&path, entries);
    DiscoveredFile::new(path, ".zip")
}
