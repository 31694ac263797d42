//! Application constants for the ETL toolset
//!
//! Default values, file extensions and column names shared across the
//! discovery, ingestion and loading stages.

// =============================================================================
// Discovery
// =============================================================================

/// Archive extension collected by date-windowed discovery
pub const ARCHIVE_EXTENSION: &str = ".zip";

/// Extension of the fixed-width instrument files inside each archive
pub const DAT_EXTENSION: &str = ".dat";

/// Days added to the first of a month before truncating back to day 1
pub const MONTH_END_OFFSET_DAYS: u64 = 31;

// =============================================================================
// Extraction
// =============================================================================

/// Retention directory used when extracted files are kept and none is given
pub const DEFAULT_RETAIN_DIR: &str = "./tmp/";

/// Prefix for per-call extraction directories
pub const EXTRACT_DIR_PREFIX: &str = "chestnut-extract-";

// =============================================================================
// Fixed-width parsing
// =============================================================================

/// Data lines sampled (after the header) when inferring column boundaries
pub const DEFAULT_INFER_ROWS: usize = 100;

// =============================================================================
// Normalization
// =============================================================================

pub const DATE_COLUMN: &str = "date";
pub const TIME_COLUMN: &str = "time";
pub const DATETIME_COLUMN: &str = "datetime";

/// Column index the derived timestamp is moved to
pub const DATETIME_POSITION: usize = 2;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// Paired with a check that the fraction is present
pub const TIME_FORMAT: &str = "%H:%M:%S%.f";

// =============================================================================
// SQL sink
// =============================================================================

pub const DEFAULT_SCHEMA: &str = "main";
pub const DEFAULT_BATCH_SIZE: usize = 10_000;
pub const DEFAULT_DATABASE: &str = "chestnut.db";

// =============================================================================
// Credentials
// =============================================================================

pub const DEFAULT_BROKER_PROGRAM: &str = "op";
pub const DEFAULT_ENV_FILE: &str = "./config/dev.env";
pub const DEFAULT_TOKEN_NAME: &str = "OP_SERVICE_ACCOUNT_TOKEN";

// =============================================================================
// Configuration
// =============================================================================

pub const ENV_PREFIX: &str = "CHESTNUT_ETL_";
pub const CONFIG_DIR_NAME: &str = "chestnut-etl";
pub const CONFIG_FILE_NAME: &str = "config.toml";
