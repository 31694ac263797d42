//! Chestnut ETL Library
//!
//! Helpers for moving fixed-width instrument data from dated zip archives
//! into tables and a SQLite database.
//!
//! This library provides tools for:
//! - Parsing date tokens (`YYYYMM`, `YYYYMMDD`, `YYYYMMDD-YYYYMMDD`) into windows
//! - Discovering archives by month directory or by dates in file names
//! - Extracting archives into per-call temporary directories
//! - Stacking the `.dat` files inside with inferred fixed-width layouts
//! - Normalizing column labels and deriving a `datetime` column
//! - Appending tables to SQLite in batches
//! - Fetching secrets through an external broker CLI

pub mod cli;
pub mod config;
pub mod constants;
pub mod credentials;
pub mod dates;
pub mod error;
pub mod flatten;
pub mod models;
pub mod processor;
pub mod schema;
pub mod sink;

pub use config::EtlConfig;
pub use credentials::CredentialBroker;
pub use dates::parse_date_input;
pub use error::{EtlError, Result};
pub use flatten::flatten;
pub use models::{DateInterval, DiscoveredFile, DiscoveryStrategy, LoadSummary, Nested, NormalizeMode};
pub use processor::discovery::FileDiscovery;
pub use processor::extract::{ExtractOptions, ExtractedArchive, extract_archive};
pub use processor::ingest::FixedWidthIngester;
pub use processor::{ArchiveLoader, process_zipped_dat_files};
pub use schema::{FixedWidthSchema, infer_schema};
pub use sink::SqlSink;
