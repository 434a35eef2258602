//! Error types shared across the import workspace

use thiserror::Error;

/// Result type alias for shared import operations
pub type Result<T> = std::result::Result<T, ImportError>;

/// Workspace-wide error type
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl ImportError {
    /// Build a configuration error for an environment variable that failed to parse
    pub fn invalid_env(var: &str, value: &str) -> Self {
        Self::Config(format!("{var} has an invalid value: '{value}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_env_message() {
        let err = ImportError::invalid_env("BATCH_SIZE", "abc");
        assert_eq!(
            err.to_string(),
            "Configuration error: BATCH_SIZE has an invalid value: 'abc'"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.csv");
        let err: ImportError = io.into();
        assert!(matches!(err, ImportError::Io(_)));
        assert!(err.to_string().contains("missing.csv"));
    }
}
