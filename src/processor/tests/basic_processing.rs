//! Basic processing pipeline tests

use super::{FLUX_JAN_01, FLUX_JAN_02, archive};
use crate::config::EtlConfig;
use crate::models::NormalizeMode;
use crate::processor::extract::ExtractOptions;
use crate::processor::ingest::FixedWidthIngester;
use crate::processor::{ArchiveLoader, process_zipped_dat_files};
use crate::sink::SqlSink;
use std::path::PathBuf;
use tempfile::TempDir;

fn column_names(sink: &SqlSink, table: &str) -> Vec<String> {
    sink.connection()
        .prepare(&format!(
            "SELECT name FROM pragma_table_info('{}') ORDER BY cid",
            table
        ))
        .unwrap()
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap()
}

#[test]
fn test_zipped_dat_files_are_stacked() {
    let temp_dir = TempDir::new().unwrap();
    let zip = archive(
        temp_dir.path(),
        "flux_20230101.zip",
        &[("a.dat", FLUX_JAN_01), ("station/b.dat", FLUX_JAN_02)],
    );

    let df = process_zipped_dat_files(
        &zip.path,
        &ExtractOptions::default(),
        &FixedWidthIngester::default(),
    )
    .unwrap();

    assert_eq!(df.height(), 5);
    let names: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(|n| n.to_string())
        .collect();
    assert_eq!(names, vec!["Date", "Time", "Flux"]);
}

#[test]
fn test_retained_extraction() {
    let temp_dir = TempDir::new().unwrap();
    let zip = archive(temp_dir.path(), "flux_20230101.zip", &[("a.dat", FLUX_JAN_01)]);
    let output_dir = temp_dir.path().join("kept");

    let df = process_zipped_dat_files(
        &zip.path,
        &ExtractOptions::keep(Some(output_dir.clone())),
        &FixedWidthIngester::default(),
    )
    .unwrap();

    assert_eq!(df.height(), 2);
    assert!(output_dir.join("flux_20230101").join("a.dat").exists());
}

#[test]
fn test_load_all_into_sink() {
    let temp_dir = TempDir::new().unwrap();
    let archives = vec![
        archive(temp_dir.path(), "flux_20230101.zip", &[("a.dat", FLUX_JAN_01)]),
        archive(temp_dir.path(), "flux_20230102.zip", &[("b.dat", FLUX_JAN_02)]),
    ];

    let mut sink = SqlSink::open_in_memory().unwrap();
    let loader = ArchiveLoader::new(&EtlConfig::default().with_batch_size(2));
    let summary = loader.load_all(&mut sink, &archives, "flux").unwrap();

    assert_eq!(summary.archives_found, 2);
    assert_eq!(summary.archives_loaded, 2);
    assert_eq!(summary.archives_failed, 0);
    assert_eq!(summary.rows_written, 5);
    assert_eq!(sink.row_count("main", "flux").unwrap(), 5);
    assert_eq!(
        column_names(&sink, "flux"),
        vec!["date", "time", "datetime", "flux"]
    );

    // each archive is written newest first
    let first: String = sink
        .connection()
        .query_row("SELECT datetime FROM flux ORDER BY rowid LIMIT 1", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(first, "2023-01-01 00:30:00");
}

#[test]
fn test_minimal_mode_only_renames() {
    let temp_dir = TempDir::new().unwrap();
    let archives = vec![archive(
        temp_dir.path(),
        "flux_20230101.zip",
        &[("a.dat", FLUX_JAN_01)],
    )];

    let mut sink = SqlSink::open_in_memory().unwrap();
    let config = EtlConfig::default().with_normalize_mode(NormalizeMode::Minimal);
    ArchiveLoader::new(&config)
        .load_all(&mut sink, &archives, "flux")
        .unwrap();

    assert_eq!(column_names(&sink, "flux"), vec!["date", "time", "flux"]);
}

#[test]
fn test_loader_keeps_extracted_files() {
    let temp_dir = TempDir::new().unwrap();
    let output_dir: PathBuf = temp_dir.path().join("kept");
    let archives = vec![archive(
        temp_dir.path(),
        "flux_20230102.zip",
        &[("b.dat", FLUX_JAN_02)],
    )];

    let mut sink = SqlSink::open_in_memory().unwrap();
    let config = EtlConfig::default().with_keep_extracted(Some(output_dir.clone()));
    let summary = ArchiveLoader::new(&config)
        .load_all(&mut sink, &archives, "flux")
        .unwrap();

    assert_eq!(summary.rows_written, 3);
    assert!(output_dir.join("flux_20230102").join("b.dat").exists());
}
