//! Configuration management and validation.
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! `CHESTNUT_ETL_*` environment variables, then command-line overrides
//! applied by the CLI. [`EtlConfig::validate`] runs last.

use crate::constants::{
    ARCHIVE_EXTENSION, CONFIG_DIR_NAME, CONFIG_FILE_NAME, DEFAULT_BATCH_SIZE, DEFAULT_DATABASE,
    DEFAULT_INFER_ROWS, DEFAULT_RETAIN_DIR, DEFAULT_SCHEMA, DEFAULT_TOKEN_NAME, ENV_PREFIX,
};
use crate::credentials::CredentialBroker;
use crate::error::{EtlError, Result};
use crate::models::{DiscoveryStrategy, NormalizeMode};
use crate::processor::extract::ExtractOptions;
use crate::sink::validate_identifier;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Where and how archives are located
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub strategy: DiscoveryStrategy,

    /// Extension collected in pruned mode
    pub extension: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            strategy: DiscoveryStrategy::default(),
            extension: ARCHIVE_EXTENSION.to_string(),
        }
    }
}

/// Extraction and fixed-width parsing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Move extracted trees to `output_dir` instead of deleting them
    pub keep_extracted: bool,
    pub output_dir: PathBuf,

    /// Data lines sampled for column boundaries
    pub infer_rows: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            keep_extracted: false,
            output_dir: PathBuf::from(DEFAULT_RETAIN_DIR),
            infer_rows: DEFAULT_INFER_ROWS,
        }
    }
}

impl ExtractionConfig {
    pub fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            keep_extracted: self.keep_extracted,
            output_dir: Some(self.output_dir.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    pub mode: NormalizeMode,
}

/// Target database settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    pub database: PathBuf,
    pub schema: String,
    pub batch_size: usize,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from(DEFAULT_DATABASE),
            schema: DEFAULT_SCHEMA.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    #[serde(flatten)]
    pub broker: CredentialBroker,

    /// Secret fetched when none is named on the command line
    pub token_name: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            broker: CredentialBroker::default(),
            token_name: DEFAULT_TOKEN_NAME.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Complete configuration for discovery, extraction, loading and secrets
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EtlConfig {
    pub discovery: DiscoveryConfig,
    pub extraction: ExtractionConfig,
    pub normalize: NormalizeConfig,
    pub sink: SinkConfig,
    pub credentials: CredentialsConfig,
    pub logging: LoggingConfig,
}

impl EtlConfig {
    /// `<config dir>/chestnut-etl/config.toml`
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| EtlError::Configuration {
            message: "Could not determine user config directory".to_string(),
        })?;
        Ok(config_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Parse a TOML file; missing sections and keys keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Defaults, then the config file, then environment variables
    ///
    /// An explicit `config_file` must exist. Without one the default location
    /// is used when present.
    pub fn load_layered(config_file: Option<&Path>) -> Result<Self> {
        let mut config = match config_file {
            Some(path) => {
                info!("Using config file: {}", path.display());
                Self::from_file(path)?
            }
            None => match Self::default_config_path() {
                Ok(path) if path.exists() => {
                    info!("Using config file: {}", path.display());
                    Self::from_file(&path)?
                }
                _ => {
                    info!("No config file found, using defaults and environment variables");
                    Self::default()
                }
            },
        };

        config.apply_env_overrides_from(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `CHESTNUT_ETL_*` overrides read through `lookup`
    pub fn apply_env_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        if let Some(database) = var("DATABASE") {
            self.sink.database = PathBuf::from(database);
        }
        if let Some(schema) = var("SCHEMA") {
            self.sink.schema = schema;
        }
        if let Some(batch_size) = var("BATCH_SIZE") {
            self.sink.batch_size = batch_size.trim().parse().map_err(|_| EtlError::Configuration {
                message: format!(
                    "{}BATCH_SIZE must be a number, got '{}'",
                    ENV_PREFIX, batch_size
                ),
            })?;
        }
        if let Some(output_dir) = var("OUTPUT_DIR") {
            self.extraction.output_dir = PathBuf::from(output_dir);
        }
        if let Some(level) = var("LOG_LEVEL") {
            self.logging.level = level;
        }
        Ok(())
    }

    /// Check settings that would otherwise fail deep inside a run
    pub fn validate(&self) -> Result<()> {
        if self.sink.batch_size == 0 {
            return Err(EtlError::Configuration {
                message: "sink.batch_size must be greater than zero".to_string(),
            });
        }
        validate_identifier(&self.sink.schema)?;
        if self.discovery.extension.trim().is_empty() {
            return Err(EtlError::Configuration {
                message: "discovery.extension must not be empty".to_string(),
            });
        }
        if self.extraction.infer_rows == 0 {
            return Err(EtlError::Configuration {
                message: "extraction.infer_rows must be greater than zero".to_string(),
            });
        }
        if !matches!(
            self.logging.level.to_lowercase().as_str(),
            "trace" | "debug" | "info" | "warn" | "error"
        ) {
            return Err(EtlError::Configuration {
                message: format!("unknown log level '{}'", self.logging.level),
            });
        }
        Ok(())
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.sink.batch_size = batch_size;
        self
    }

    pub fn with_normalize_mode(mut self, mode: NormalizeMode) -> Self {
        self.normalize.mode = mode;
        self
    }

    pub fn with_keep_extracted(mut self, output_dir: Option<PathBuf>) -> Self {
        self.extraction.keep_extracted = true;
        if let Some(output_dir) = output_dir {
            self.extraction.output_dir = output_dir;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = EtlConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sink.schema, "main");
        assert_eq!(config.sink.batch_size, 10_000);
        assert_eq!(config.discovery.extension, ".zip");
        assert_eq!(config.normalize.mode, NormalizeMode::Full);
        assert_eq!(config.credentials.broker.program, "op");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[sink]
database = "flux.db"
batch_size = 500

[discovery]
strategy = "flat"

[normalize]
mode = "minimal"

[credentials]
program = "vault-cli"
"#,
        )
        .unwrap();

        let config = EtlConfig::from_file(&path).unwrap();
        assert_eq!(config.sink.database, PathBuf::from("flux.db"));
        assert_eq!(config.sink.batch_size, 500);
        assert_eq!(config.sink.schema, "main");
        assert_eq!(config.discovery.strategy, DiscoveryStrategy::Flat);
        assert_eq!(config.normalize.mode, NormalizeMode::Minimal);
        assert_eq!(config.credentials.broker.program, "vault-cli");
        assert_eq!(
            config.credentials.broker.env_file,
            PathBuf::from("./config/dev.env")
        );
    }

    #[test]
    fn test_invalid_toml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[sink\nbatch_size = ").unwrap();
        assert!(matches!(
            EtlConfig::from_file(&path),
            Err(EtlError::ConfigParse(_))
        ));
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = EtlConfig::load_layered(Some(&temp_dir.path().join("absent.toml")));
        assert!(matches!(result, Err(EtlError::Io(_))));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<String, String> = [
            ("CHESTNUT_ETL_DATABASE", "env.db"),
            ("CHESTNUT_ETL_SCHEMA", "archive"),
            ("CHESTNUT_ETL_BATCH_SIZE", " 250 "),
            ("CHESTNUT_ETL_LOG_LEVEL", "debug"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let mut config = EtlConfig::default();
        config
            .apply_env_overrides_from(|key| vars.get(key).cloned())
            .unwrap();
        assert_eq!(config.sink.database, PathBuf::from("env.db"));
        assert_eq!(config.sink.schema, "archive");
        assert_eq!(config.sink.batch_size, 250);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.extraction.output_dir, PathBuf::from("./tmp/"));
    }

    #[test]
    fn test_bad_env_batch_size() {
        let mut config = EtlConfig::default();
        let result = config.apply_env_overrides_from(|key| {
            (key == "CHESTNUT_ETL_BATCH_SIZE").then(|| "lots".to_string())
        });
        assert!(matches!(result, Err(EtlError::Configuration { .. })));
    }

    #[test]
    fn test_validation_failures() {
        assert!(matches!(
            EtlConfig::default().with_batch_size(0).validate(),
            Err(EtlError::Configuration { .. })
        ));

        let mut config = EtlConfig::default();
        config.sink.schema = "main; DROP".to_string();
        assert!(matches!(
            config.validate(),
            Err(EtlError::InvalidIdentifier { .. })
        ));

        let mut config = EtlConfig::default();
        config.discovery.extension = " ".to_string();
        assert!(config.validate().is_err());

        let mut config = EtlConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_builders() {
        let config = EtlConfig::default()
            .with_batch_size(42)
            .with_normalize_mode(NormalizeMode::None)
            .with_keep_extracted(Some(PathBuf::from("out")));
        assert_eq!(config.sink.batch_size, 42);
        assert_eq!(config.normalize.mode, NormalizeMode::None);

        let options = config.extraction.extract_options();
        assert!(options.keep_extracted);
        assert_eq!(options.output_dir, Some(PathBuf::from("out")));
    }
}
