//! Configuration-related errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while loading gateway configuration.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Config read error for {path}: {message}")]
    ReadError {
        /// Filesystem path of the config file
        path: String,
        /// Description of the I/O failure
        message: String,
    },

    /// Config file parse error
    #[error("Config parse error: {message}")]
    ParseError {
        /// Description of the parse failure
        message: String,
    },

    /// Config validation error (invalid values)
    #[error("Config validation error for {field}: {message}")]
    ValidationError {
        /// Name of the field that failed validation
        field: String,
        /// Description of the validation failure
        message: String,
    },

    /// Environment override could not be applied
    #[error("Invalid environment override {var}: {message}")]
    InvalidOverride { var: String, message: String },
}

impl ConfigError {
    /// Create a parse error from a serde_json error.
    pub fn from_json_error(e: &serde_json::Error) -> Self {
        Self::ParseError { message: e.to_string() }
    }

    /// Flatten `validator` output into the first offending field.
    pub fn from_validation(errors: &validator::ValidationErrors) -> Self {
        let field = errors
            .field_errors()
            .keys()
            .next()
            .map_or_else(|| "config".to_string(), |f| f.to_string());
        Self::ValidationError { field, message: errors.to_string() }
    }
}
