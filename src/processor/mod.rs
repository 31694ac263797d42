//! Archive processing pipeline.
//!
//! Chains the stages: date-windowed discovery of zip archives, extraction to
//! a working directory, fixed-width ingestion, normalization and appending to
//! the SQL sink.

pub mod discovery;
pub mod extract;
pub mod ingest;
pub mod normalize;

#[cfg(test)]
pub mod tests;

use self::{
    extract::{ExtractOptions, extract_archive},
    ingest::FixedWidthIngester,
    normalize::normalize,
};

use crate::config::EtlConfig;
use crate::error::Result;
use crate::models::{DiscoveredFile, LoadSummary, NormalizeMode};
use crate::sink::{SqlSink, validate_identifier};

use indicatif::{ProgressBar, ProgressStyle};
use polars::prelude::*;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Extract a zip archive and stack every `.dat` file inside it
///
/// The extraction directory is released before returning, deleted or moved
/// to the retention directory according to `options`, including when
/// ingestion fails.
pub fn process_zipped_dat_files(
    zip_path: &Path,
    options: &ExtractOptions,
    ingester: &FixedWidthIngester,
) -> Result<DataFrame> {
    let extracted = extract_archive(zip_path, options)?;
    let ingested = ingester.ingest_dir(extracted.path());
    let finished = extracted.finish();

    let df = ingested?;
    finished?;
    debug!(
        "Ingested {} rows from {}",
        df.height(),
        zip_path.display()
    );
    Ok(df)
}

/// Loads discovered archives into one table of a SQL sink
#[derive(Debug, Clone)]
pub struct ArchiveLoader {
    extract_options: ExtractOptions,
    ingester: FixedWidthIngester,
    mode: NormalizeMode,
    schema: String,
    batch_size: usize,
    show_progress: bool,
}

impl ArchiveLoader {
    pub fn new(config: &EtlConfig) -> Self {
        Self {
            extract_options: config.extraction.extract_options(),
            ingester: FixedWidthIngester::new(config.extraction.infer_rows),
            mode: config.normalize.mode,
            schema: config.sink.schema.clone(),
            batch_size: config.sink.batch_size,
            show_progress: false,
        }
    }

    /// Draw a progress bar while loading
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Ingest, normalize and append a single archive; returns rows written
    pub fn load_archive(&self, sink: &mut SqlSink, zip_path: &Path, table: &str) -> Result<usize> {
        let df = process_zipped_dat_files(zip_path, &self.extract_options, &self.ingester)?;
        let df = normalize(df, self.mode)?;
        sink.write_chunk(&df, table, &self.schema, self.batch_size)
    }

    /// Load every archive, continuing past archives that fail
    ///
    /// Failures are logged and counted in the summary. Only an invalid
    /// target (bad identifier or batch size) aborts the run.
    pub fn load_all(
        &self,
        sink: &mut SqlSink,
        archives: &[DiscoveredFile],
        table: &str,
    ) -> Result<LoadSummary> {
        validate_identifier(&self.schema)?;
        validate_identifier(table)?;

        let start_time = Instant::now();
        let mut summary = LoadSummary {
            archives_found: archives.len(),
            ..Default::default()
        };

        let progress = if self.show_progress {
            let pb = ProgressBar::new(archives.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template(
                        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
                    )
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            pb.set_message("Loading archives");
            pb
        } else {
            ProgressBar::hidden()
        };

        for archive in archives {
            match self.load_archive(sink, &archive.path, table) {
                Ok(rows) => {
                    summary.archives_loaded += 1;
                    summary.rows_written += rows;
                }
                Err(e) => {
                    warn!("Failed to load {}: {}", archive.path.display(), e);
                    summary.archives_failed += 1;
                }
            }
            progress.inc(1);
        }
        progress.finish_and_clear();

        summary.processing_time_ms = start_time.elapsed().as_millis();
        info!(
            "Loaded {}/{} archives ({} rows) into {}.{}",
            summary.archives_loaded, summary.archives_found, summary.rows_written, self.schema, table
        );
        Ok(summary)
    }
}
