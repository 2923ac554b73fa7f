use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Failed to load source '{path}': {message}")]
    SourceLoad { path: String, message: String },

    #[error("Required column '{column}' is missing after normalization")]
    SchemaPrecondition { column: String },

    #[error("Columns {sources:?} all normalize to '{column}'")]
    ColumnCollision { column: String, sources: Vec<String> },

    #[error("Staging append to '{table}' failed: {message}")]
    StagingAppend { table: String, message: String },

    #[error("Staging read from '{table}' failed: {message}")]
    StagingRead { table: String, message: String },

    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl EtlError {
    pub fn source_load(path: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::SourceLoad {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// True for errors that abort a run before any statistics exist.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::StagingAppend { .. } | Self::StagingRead { .. })
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_errors_convert_and_stay_fatal() {
        let err: EtlError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, EtlError::Json(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_staging_errors_are_not_fatal() {
        let err = EtlError::StagingAppend {
            table: "staging_table".to_string(),
            message: "database is locked".to_string(),
        };
        assert!(!err.is_fatal());
    }
}
