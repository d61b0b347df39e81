//! Error types for azure-webapp.
//!
//! Module and cloud errors keep their own enums
//! ([`ModuleError`](crate::modules::ModuleError),
//! [`AzureError`](crate::modules::cloud::azure::AzureError)); this one wraps
//! them together with the errors of loading parameters and configuration.

use crate::modules::ModuleError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for azure-webapp operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for azure-webapp.
#[derive(Error, Debug)]
pub enum Error {
    /// A parameters file could not be read or has the wrong shape.
    #[error("Failed to load parameters from '{path}': {message}")]
    ParamsLoad {
        /// Path to the parameters file
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// A `key=value` extra variable is malformed.
    #[error("Invalid extra variable '{0}': expected key=value or @file")]
    ExtraVar(String),

    /// Module failed.
    #[error(transparent)]
    Module(#[from] ModuleError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error.
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl Error {
    /// Creates a new parameters load error.
    pub fn params_load(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ParamsLoad {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns the error code for CLI exit status.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Module(_) => 2,
            Error::ParamsLoad { .. }
            | Error::ExtraVar(_)
            | Error::YamlParse(_)
            | Error::JsonParse(_) => 4,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::cloud::azure::AzureError;

    #[test]
    fn test_exit_codes() {
        let module: Error = ModuleError::from(AzureError::InvalidSku("X1".into())).into();
        assert_eq!(module.exit_code(), 2);
        assert_eq!(Error::params_load("p.yml", "empty").exit_code(), 4);
        assert_eq!(Error::Config("bad".into()).exit_code(), 1);
    }

    #[test]
    fn test_module_error_is_transparent() {
        let err: Error = ModuleError::MissingParameter("name".into()).into();
        assert_eq!(err.to_string(), "Missing required parameter: name");
    }
}
