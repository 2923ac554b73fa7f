use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::constants::{
    DEFAULT_CONFIG_FILE, DEFAULT_INPUT_PATH, DEFAULT_LOG_DIR, DEFAULT_OUTPUT_PATH,
    DEFAULT_STAGING_DB, DEFAULT_STAGING_TABLE,
};
use crate::error::{EtlError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Source used when a run is not given one explicitly
    pub input_path: PathBuf,
    /// Where the transformed dataset is written as CSV
    pub output_path: PathBuf,
    pub staging: StagingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingConfig {
    pub db_path: PathBuf,
    pub table: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_dir: PathBuf,
    pub file_name: String,
    /// Directive added on top of `RUST_LOG`
    pub directive: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from(DEFAULT_INPUT_PATH),
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            staging: StagingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_STAGING_DB),
            table: DEFAULT_STAGING_TABLE.to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            file_name: "etl.log".to_string(),
            directive: "csv_staging_etl=info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration: `.env`, then the TOML file, then `ETL_*` overrides.
    ///
    /// An explicit `path` must exist. Without one, `etl.toml` in the working
    /// directory is used when present and defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv::dotenv().ok();

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            EtlError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        debug!("Loaded config from {}", path.display());
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply `ETL_*` overrides; `lookup` resolves a variable name to its value.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(v) = lookup("ETL_INPUT_PATH") {
            self.input_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("ETL_OUTPUT_PATH") {
            self.output_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("ETL_STAGING_DB") {
            self.staging.db_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("ETL_STAGING_TABLE") {
            self.staging.table = v;
        }
        if let Some(v) = lookup("ETL_LOG_DIR") {
            self.logging.log_dir = PathBuf::from(v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_match_the_original_tool() {
        let config = Config::default();
        assert_eq!(config.input_path, PathBuf::from("input.csv"));
        assert_eq!(config.output_path, PathBuf::from("output.csv"));
        assert_eq!(config.staging.db_path, PathBuf::from("staging.db"));
        assert_eq!(config.staging.table, "staging_table");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            input_path = "data/source.csv"

            [staging]
            table = "runs"
            "#,
        )
        .unwrap();
        assert_eq!(config.input_path, PathBuf::from("data/source.csv"));
        assert_eq!(config.staging.table, "runs");
        assert_eq!(config.staging.db_path, PathBuf::from("staging.db"));
        assert_eq!(config.output_path, PathBuf::from("output.csv"));
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(matches!(
            Config::from_toml_str("input_path = ["),
            Err(EtlError::Toml(_))
        ));
    }

    #[test]
    fn test_env_overrides_win() {
        let vars: HashMap<&str, &str> = [
            ("ETL_STAGING_DB", "/tmp/other.db"),
            ("ETL_STAGING_TABLE", "archive"),
            ("ETL_OUTPUT_PATH", "  "),
        ]
        .into_iter()
        .collect();
        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.staging.db_path, PathBuf::from("/tmp/other.db"));
        assert_eq!(config.staging.table, "archive");
        assert_eq!(config.output_path, PathBuf::from("output.csv"));
    }

    #[test]
    fn test_explicit_missing_file_is_a_config_error() {
        assert!(matches!(
            Config::load(Some(Path::new("does/not/exist.toml"))),
            Err(EtlError::Config(_))
        ));
    }
}
