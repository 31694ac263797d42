//! File discovery module for instrument archives
//!
//! Locates archives under a base directory that fall inside a date window,
//! either by pruning `YYYYMM` month directories or by matching dates embedded
//! in file names anywhere in the tree.

use crate::constants::ARCHIVE_EXTENSION;
use crate::dates::{directory_in_range, filename_in_range, parse_date_input};
use crate::error::Result;
use crate::flatten::flatten;
use crate::models::{DateInterval, DiscoveredFile, DiscoveryStrategy, Nested};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// File discovery component rooted at one base directory
#[derive(Debug)]
pub struct FileDiscovery {
    base_dir: PathBuf,
}

impl FileDiscovery {
    /// Create a discovery instance; relative bases are resolved against the
    /// current directory so every discovered path is absolute
    pub fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            base_dir: std::path::absolute(base_dir.as_ref())?,
        })
    }

    /// Discover files using the selected strategy
    pub fn discover(
        &self,
        interval: &DateInterval,
        strategy: DiscoveryStrategy,
        extension: &str,
    ) -> Result<Vec<DiscoveredFile>> {
        match strategy {
            DiscoveryStrategy::Pruned => self.discover_in_month_dirs(interval, extension),
            DiscoveryStrategy::Flat => self.discover_by_file_date(interval),
        }
    }

    /// Collect files under the `YYYYMM` children of the base whose first day is in the window
    ///
    /// Expected layout:
    /// ```text
    /// base/
    ///   201909/
    ///     site-a/
    ///       data.zip
    ///   201910/
    ///     data.zip
    ///   notes/          (ignored, not a month)
    /// ```
    pub fn discover_in_month_dirs(
        &self,
        interval: &DateInterval,
        extension: &str,
    ) -> Result<Vec<DiscoveredFile>> {
        let mut files = Vec::new();

        for entry in fs::read_dir(&self.base_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }

            let dir_name = entry.file_name();
            let Some(dir_name) = dir_name.to_str() else {
                continue;
            };

            if directory_in_range(dir_name, interval) {
                debug!("{}: Passed directory range test", entry.path().display());
                files.extend(
                    find_files_by_extension(entry.path(), extension, None)?
                        .into_iter()
                        .map(|path| DiscoveredFile::new(path, extension)),
                );
            }
        }

        debug!(
            "Found {} {} files in month directories of {}",
            files.len(),
            extension,
            self.base_dir.display()
        );
        Ok(files)
    }

    /// Walk the whole tree collecting archives whose names carry a date in the window
    pub fn discover_by_file_date(&self, interval: &DateInterval) -> Result<Vec<DiscoveredFile>> {
        let mut files = Vec::new();

        for entry in WalkDir::new(&self.base_dir) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let Some(file_name) = entry.file_name().to_str() else {
                continue;
            };

            if file_name.ends_with(ARCHIVE_EXTENSION) && filename_in_range(file_name, interval) {
                files.push(DiscoveredFile::new(
                    entry.path().to_path_buf(),
                    ARCHIVE_EXTENSION,
                ));
            }
        }

        debug!(
            "Found {} dated archives under {}",
            files.len(),
            self.base_dir.display()
        );
        Ok(files)
    }
}

/// Recursively find files ending with `extension`, optionally requiring
/// `substring` in the file name
pub fn find_files_by_extension(
    directory: impl AsRef<Path>,
    extension: &str,
    substring: Option<&str>,
) -> Result<Vec<PathBuf>> {
    let mut matching = Vec::new();

    for entry in WalkDir::new(directory.as_ref()) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let file_name = entry.file_name().to_string_lossy();
        if file_name.ends_with(extension) && substring.is_none_or(|s| file_name.contains(s)) {
            matching.push(entry.path().to_path_buf());
        }
    }

    Ok(matching)
}

/// Find files with `extension` under the month directories of `base_dir`
/// whose first day falls in `date_input`
pub fn find_files_by_date_and_extension(
    base_dir: impl AsRef<Path>,
    date_input: &str,
    extension: &str,
) -> Result<Vec<PathBuf>> {
    let interval = parse_date_input(date_input)?;
    let files = FileDiscovery::new(base_dir)?.discover_in_month_dirs(&interval, extension)?;
    Ok(files.into_iter().map(|f| f.path).collect())
}

/// Find archives anywhere under `base_dir` whose names carry a date in `date_input`
pub fn find_files_by_date_range(
    base_dir: impl AsRef<Path>,
    date_input: &str,
) -> Result<Vec<PathBuf>> {
    let interval = parse_date_input(date_input)?;
    let files = FileDiscovery::new(base_dir)?.discover_by_file_date(&interval)?;
    Ok(files.into_iter().map(|f| f.path).collect())
}

/// Run discovery over several base directories and flatten the results in
/// base order
pub fn discover_across<P: AsRef<Path>>(
    base_dirs: &[P],
    interval: &DateInterval,
    strategy: DiscoveryStrategy,
    extension: &str,
) -> Result<Vec<DiscoveredFile>> {
    let mut per_base = Vec::with_capacity(base_dirs.len());
    for base in base_dirs {
        let files = FileDiscovery::new(base)?.discover(interval, strategy, extension)?;
        per_base.push(Nested::Branch(files.into_iter().map(Nested::Leaf).collect()));
    }
    Ok(flatten(per_base))
}
