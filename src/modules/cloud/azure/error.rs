//! Error types for the Azure Web App module.
//!
//! Every failure that can stop a reconciliation is represented here. The
//! only variant that is not fatal is [`AzureError::ResourceNotFound`], which
//! the resource client turns into an "absent" observation for get-calls.

use thiserror::Error;

/// Result type alias for Azure operations.
pub type AzureResult<T> = std::result::Result<T, AzureError>;

/// Errors raised while building, diffing or reconciling a Web App.
#[derive(Error, Debug)]
pub enum AzureError {
    // ========================================================================
    // Desired-state errors
    // ========================================================================
    /// A new plan has to be created but required plan data is absent.
    #[error("Missing app service plan fields: {}. Please specify name, is_linux and sku in plan", .fields.join(", "))]
    MissingPlanFields {
        /// Names of the missing plan fields
        fields: Vec<String>,
    },

    /// Mutually exclusive runtime settings were both supplied.
    #[error("Conflicting configuration: {0}")]
    ConflictingConfiguration(String),

    /// Unrecognized pricing tier code.
    #[error("Invalid sku (pricing tier) '{0}'. Valid values: F1, FREE, D1, SHARED, B1-B3, S1-S3, P1-P3, P1V2-P3V2")]
    InvalidSku(String),

    // ========================================================================
    // Resource client errors
    // ========================================================================
    /// A get-call found nothing at the requested path.
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// The management API rejected a call.
    #[error("{operation} failed{}: {message}", .status.map(|s| format!(" with status {}", s)).unwrap_or_default())]
    UpstreamCallFailure {
        /// The resource client operation that failed
        operation: String,
        /// HTTP status code, if a response was received
        status: Option<u16>,
        /// Error message reported by the service
        message: String,
    },

    /// The client could not be set up from configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Credentials were missing or the token endpoint refused them.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// A long-running operation did not finish in time.
    #[error("Timed out after {timeout_secs} seconds waiting for {operation}")]
    Timeout {
        /// Operation being awaited
        operation: String,
        /// Elapsed timeout in seconds
        timeout_secs: u64,
    },

    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body could not be decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid management endpoint or resource path.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl AzureError {
    /// Create an upstream failure for `operation`.
    pub fn upstream(
        operation: impl Into<String>,
        status: Option<u16>,
        message: impl Into<String>,
    ) -> Self {
        AzureError::UpstreamCallFailure {
            operation: operation.into(),
            status,
            message: message.into(),
        }
    }

    /// Whether this error is the "absent" observation of a get-call.
    pub fn is_not_found(&self) -> bool {
        matches!(self, AzureError::ResourceNotFound(_))
    }
}

/// Turns [`AzureError::ResourceNotFound`] into `Ok(None)`.
pub trait NotFoundExt<T> {
    /// Map a not-found failure to an absent observation.
    fn not_found_as_none(self) -> AzureResult<Option<T>>;
}

impl<T> NotFoundExt<T> for AzureResult<T> {
    fn not_found_as_none(self) -> AzureResult<Option<T>> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}
