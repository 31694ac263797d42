//! Archive extraction into scoped working directories.
//!
//! Every extraction gets its own uniquely named directory. Unless retention
//! is requested the directory is removed when the handle is finished or
//! dropped; retained extractions are moved to `<output_dir>/<archive stem>`.

use crate::constants::{DEFAULT_RETAIN_DIR, EXTRACT_DIR_PREFIX};
use crate::error::Result;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};
use zip::ZipArchive;

/// Extraction settings
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Keep the extracted files after ingestion
    pub keep_extracted: bool,
    /// Where retained files go; defaults to `./tmp/`
    pub output_dir: Option<PathBuf>,
}

impl ExtractOptions {
    pub fn keep(output_dir: Option<PathBuf>) -> Self {
        Self {
            keep_extracted: true,
            output_dir,
        }
    }

    fn retain_dir(&self) -> Option<PathBuf> {
        self.keep_extracted.then(|| {
            self.output_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_RETAIN_DIR))
        })
    }
}

/// Handle on an extracted archive
#[derive(Debug)]
pub struct ExtractedArchive {
    dir: TempDir,
    archive_path: PathBuf,
    retain_dir: Option<PathBuf>,
}

impl ExtractedArchive {
    /// Directory holding the extracted contents
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Release the extraction directory
    ///
    /// Deletes it, or when retention was requested moves it to
    /// `<output_dir>/<archive stem>` (replacing an earlier output of the same
    /// name) and returns the new location.
    pub fn finish(self) -> Result<Option<PathBuf>> {
        let Some(retain_dir) = self.retain_dir else {
            debug!("Removing extraction directory {}", self.dir.path().display());
            self.dir.close()?;
            return Ok(None);
        };

        let stem = self
            .archive_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "archive".to_string());
        let target = retain_dir.join(stem);

        if target.exists() {
            debug!("Replacing previous output at {}", target.display());
            fs::remove_dir_all(&target)?;
        }
        fs::rename(self.dir.path(), &target)?;
        info!("Kept extracted files in {}", target.display());

        // The TempDir now points at a moved path; its cleanup is a no-op.
        drop(self.dir);
        Ok(Some(target))
    }
}

/// Extract every entry of a zip archive into a fresh working directory
pub fn extract_archive(zip_path: &Path, options: &ExtractOptions) -> Result<ExtractedArchive> {
    let retain_dir = options.retain_dir();

    // Retained extractions are staged next to their destination so the final
    // move never crosses filesystems.
    let dir = match &retain_dir {
        Some(retain_dir) => {
            fs::create_dir_all(retain_dir)?;
            tempfile::Builder::new()
                .prefix(EXTRACT_DIR_PREFIX)
                .tempdir_in(retain_dir)?
        }
        None => tempfile::Builder::new().prefix(EXTRACT_DIR_PREFIX).tempdir()?,
    };

    let file = File::open(zip_path)?;
    let mut archive = ZipArchive::new(BufReader::new(file))?;
    let entries = archive.len();
    archive.extract(dir.path())?;

    debug!(
        "Extracted {} entries from {} into {}",
        entries,
        zip_path.display(),
        dir.path().display()
    );

    Ok(ExtractedArchive {
        dir,
        archive_path: zip_path.to_path_buf(),
        retain_dir,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    /// Write a zip archive holding `entries` (name, contents)
    pub(crate) fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for (name, contents) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(contents.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_extracted_directory_removed_without_retention() {
        let temp_dir = TempDir::new().unwrap();
        let zip_path = temp_dir.path().join("site.zip");
        write_zip(&zip_path, &[("a.dat", "x\n1\n"), ("nested/b.dat", "x\n2\n")]);

        let extracted = extract_archive(&zip_path, &ExtractOptions::default()).unwrap();
        let dir = extracted.path().to_path_buf();
        assert!(dir.join("a.dat").exists());
        assert!(dir.join("nested").join("b.dat").exists());

        let kept = extracted.finish().unwrap();
        assert!(kept.is_none());
        assert!(!dir.exists());
    }

    #[test]
    fn test_dropping_handle_cleans_up() {
        let temp_dir = TempDir::new().unwrap();
        let zip_path = temp_dir.path().join("site.zip");
        write_zip(&zip_path, &[("a.dat", "x\n1\n")]);

        let dir = {
            let extracted = extract_archive(&zip_path, &ExtractOptions::default()).unwrap();
            extracted.path().to_path_buf()
        };
        assert!(!dir.exists());
    }

    #[test]
    fn test_retained_extraction_moves_to_output_dir() {
        let temp_dir = TempDir::new().unwrap();
        let zip_path = temp_dir.path().join("site_20200310.zip");
        write_zip(&zip_path, &[("a.dat", "x\n1\n")]);
        let output_dir = temp_dir.path().join("kept");

        let extracted =
            extract_archive(&zip_path, &ExtractOptions::keep(Some(output_dir.clone()))).unwrap();
        let staging = extracted.path().to_path_buf();
        let kept = extracted.finish().unwrap().unwrap();

        assert_eq!(kept, output_dir.join("site_20200310"));
        assert!(kept.join("a.dat").exists());
        assert!(!staging.exists());
    }

    #[test]
    fn test_retained_extraction_replaces_same_named_output() {
        let temp_dir = TempDir::new().unwrap();
        let zip_path = temp_dir.path().join("site.zip");
        let output_dir = temp_dir.path().join("kept");

        write_zip(&zip_path, &[("old.dat", "x\n1\n")]);
        extract_archive(&zip_path, &ExtractOptions::keep(Some(output_dir.clone())))
            .unwrap()
            .finish()
            .unwrap();

        write_zip(&zip_path, &[("new.dat", "x\n2\n")]);
        let kept = extract_archive(&zip_path, &ExtractOptions::keep(Some(output_dir.clone())))
            .unwrap()
            .finish()
            .unwrap()
            .unwrap();

        assert!(kept.join("new.dat").exists());
        assert!(!kept.join("old.dat").exists());
    }

    #[test]
    fn test_each_extraction_gets_its_own_directory() {
        let temp_dir = TempDir::new().unwrap();
        let zip_path = temp_dir.path().join("site.zip");
        write_zip(&zip_path, &[("a.dat", "x\n1\n")]);

        let first = extract_archive(&zip_path, &ExtractOptions::default()).unwrap();
        let second = extract_archive(&zip_path, &ExtractOptions::default()).unwrap();
        assert_ne!(first.path(), second.path());
    }

    #[test]
    fn test_invalid_archive() {
        let temp_dir = TempDir::new().unwrap();
        let zip_path = temp_dir.path().join("broken.zip");
        fs::write(&zip_path, "this is not a zip archive").unwrap();

        let result = extract_archive(&zip_path, &ExtractOptions::default());
        assert!(matches!(result, Err(crate::error::EtlError::Archive(_))));
    }
}
