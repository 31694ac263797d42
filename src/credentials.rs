//! Secret lookup through an external secret-manager CLI.
//!
//! The broker program is asked to run `printenv <name>` inside an environment
//! populated from an env file, so the secret never has to be written to disk
//! by this crate.

use crate::constants::{DEFAULT_BROKER_PROGRAM, DEFAULT_ENV_FILE};
use crate::error::{EtlError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Runs `<program> run --no-masking --env-file=<env_file> -- printenv <name>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialBroker {
    pub program: String,
    pub env_file: PathBuf,
}

impl Default for CredentialBroker {
    fn default() -> Self {
        Self {
            program: DEFAULT_BROKER_PROGRAM.to_string(),
            env_file: PathBuf::from(DEFAULT_ENV_FILE),
        }
    }
}

impl CredentialBroker {
    pub fn new(program: impl Into<String>, env_file: impl AsRef<Path>) -> Self {
        Self {
            program: program.into(),
            env_file: env_file.as_ref().to_path_buf(),
        }
    }

    fn command(&self, name: &str) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("run")
            .arg("--no-masking")
            .arg(format!("--env-file={}", self.env_file.display()))
            .arg("--")
            .arg("printenv")
            .arg(name);
        command
    }

    /// Fetch the value of `name`, trimmed of surrounding whitespace
    ///
    /// A non-zero exit becomes [`EtlError::CredentialBroker`] carrying the
    /// broker's stderr unchanged. Failing to start the program is an I/O error.
    pub fn fetch(&self, name: &str) -> Result<String> {
        debug!("Fetching secret '{}' via {}", name, self.program);
        let output = self.command(name).output()?;

        if !output.status.success() {
            return Err(EtlError::CredentialBroker {
                name: name.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}
