//! Configuration file
//!
//! ```json
//! {
//!   "schema_file": "schema.json",
//!   "key_file": "keys/app.json",
//!   "log": { "level": "info", "format": "compact" },
//!   "verification": { "validate_empty_collections": true }
//! }
//! ```
//!
//! Relative paths resolve against the directory holding the config file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::errors::{CliError, CliResult};
use crate::observability::LogConfig;
use crate::verify::CountOptions;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Schema file mapping namespaces to definitions (default "schema.json")
    #[serde(default = "default_schema_file")]
    pub schema_file: PathBuf,

    /// Data key file, required by encrypt, decrypt and compare --decrypt
    #[serde(default)]
    pub key_file: Option<PathBuf>,

    #[serde(default)]
    pub log: LogConfig,

    #[serde(default)]
    pub verification: CountOptions,

    /// Directory of the config file
    #[serde(skip)]
    base_dir: PathBuf,
}

fn default_schema_file() -> PathBuf {
    PathBuf::from("schema.json")
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            CliError::config_error(format!("Failed to read config {}: {}", path.display(), e))
        })?;

        let mut config: Config = serde_json::from_str(&content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;

        config.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> CliResult<()> {
        if self.schema_file.as_os_str().is_empty() {
            return Err(CliError::config_error("schema_file must not be empty"));
        }

        if self.log.level.trim().is_empty() {
            return Err(CliError::config_error("log.level must not be empty"));
        }

        if let Some(key_file) = &self.key_file {
            if key_file.as_os_str().is_empty() {
                return Err(CliError::config_error("key_file must not be empty when set"));
            }
        }

        Ok(())
    }

    pub fn schema_path(&self) -> PathBuf {
        self.base_dir.join(&self.schema_file)
    }

    /// Resolved key file, or a config error naming the command that needs it
    pub fn key_path(&self, command: &str) -> CliResult<PathBuf> {
        self.key_file
            .as_ref()
            .map(|key_file| self.base_dir.join(key_file))
            .ok_or_else(|| CliError::config_error(format!("'{}' requires key_file in the config", command)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::LogFormat;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("fieldseal.json");
        fs::write(&path, "{}").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.schema_path(), temp_dir.path().join("schema.json"));
        assert_eq!(config.log.level, "info");
        assert_eq!(config.log.format, LogFormat::Compact);
        assert!(config.verification.validate_empty_collections);
        assert!(config.key_path("encrypt").is_err());
    }

    #[test]
    fn test_paths_relative_to_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("fieldseal.json");
        fs::write(
            &path,
            r#"{"schema_file": "conf/schema.json", "key_file": "keys/app.json", "log": {"format": "json"}}"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.schema_path(), temp_dir.path().join("conf/schema.json"));
        assert_eq!(config.key_path("decrypt").unwrap(), temp_dir.path().join("keys/app.json"));
        assert_eq!(config.log.format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("fieldseal.json");

        fs::write(&path, r#"{"schema_file": ""}"#).unwrap();
        assert!(Config::load(&path).is_err());

        fs::write(&path, r#"{"data_dir": "/tmp"}"#).unwrap();
        assert!(Config::load(&path).is_err());

        assert!(Config::load(&temp_dir.path().join("absent.json")).is_err());
    }
}
