//! Error handling for ETL operations.
//!
//! Provides error types with context for date parsing, archive extraction,
//! fixed-width ingestion, normalization and database writes.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Directory traversal error: {0}")]
    Directory(#[from] walkdir::Error),

    #[error("Failed to parse config file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error(
        "Invalid date input format '{input}'. Use YYYYMM, YYYYMMDD, or YYYYMMDD-YYYYMMDD."
    )]
    InvalidDateFormat { input: String },

    #[error("No .dat files found in: {path}")]
    FileNotFound { path: PathBuf },

    #[error(
        "Error concatenating .dat files: ensure consistent structure. \
         File {path} has columns [{found}] but [{expected}] was expected"
    )]
    SchemaMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },

    #[error(
        "'{column}' column not found. Column labels may not have been normalized, \
         or this is not a .dat file this toolset understands. Found: [{available}]"
    )]
    MissingColumn { column: String, available: String },

    #[error("Failed to get secret '{name}': {stderr}")]
    CredentialBroker { name: String, stderr: String },

    #[error("Invalid SQL identifier '{identifier}': only letters, digits and '_' are allowed")]
    InvalidIdentifier { identifier: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

pub type Result<T> = std::result::Result<T, EtlError>;
