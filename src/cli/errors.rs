//! CLI-specific error types
//!
//! All CLI errors end the process with a non-zero exit code.

use std::fmt;
use std::io;

use crate::config::ConfigError;
use crate::core::CoreError;
use crate::schema::SchemaError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// I/O error (files, stdout)
    IoError,
    /// Model document rejected
    ModelError,
    /// Data or query file rejected
    InputError,
    /// The request failed in the pipeline
    QueryFailed,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "AERO_CLI_CONFIG_ERROR",
            Self::IoError => "AERO_CLI_IO_ERROR",
            Self::ModelError => "AERO_CLI_MODEL_ERROR",
            Self::InputError => "AERO_CLI_INPUT_ERROR",
            Self::QueryFailed => "AERO_CLI_QUERY_FAILED",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    pub fn model_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ModelError, msg)
    }

    pub fn input_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::InputError, msg)
    }

    pub fn query_failed(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::QueryFailed, msg)
    }

    /// Get the error code
    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::config_error(format!("{}: {}", e.code(), e))
    }
}

impl From<SchemaError> for CliError {
    fn from(e: SchemaError) -> Self {
        Self::model_error(e.to_string())
    }
}

impl From<CoreError> for CliError {
    /// Keeps the pipeline's own code in the message
    fn from(e: CoreError) -> Self {
        Self::query_failed(format!("{}: {}", e.code(), e))
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewrite::RewriteError;

    #[test]
    fn test_display_carries_code() {
        let err = CliError::input_error("bad query");
        assert_eq!(err.to_string(), "AERO_CLI_INPUT_ERROR: bad query");
        assert_eq!(err.code(), &CliErrorCode::InputError);
    }

    #[test]
    fn test_core_error_keeps_pipeline_code() {
        let err: CliError = CoreError::from(RewriteError::UnsupportedQuery("Me".into())).into();
        assert_eq!(err.code_str(), "AERO_CLI_QUERY_FAILED");
        assert!(err.message().starts_with("AERO_REWRITE_UNSUPPORTED_QUERY"));
    }
}
