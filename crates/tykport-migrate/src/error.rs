//! Error types for migration operations.

use thiserror::Error;

/// Migration-specific errors.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// The WSO2 control tool could not be started.
    #[error("Control tool not found: {0}")]
    ToolMissing(String),

    /// The WSO2 control tool exited with a failure.
    #[error("Control tool command failed: {0}")]
    ToolFailed(String),

    /// The installed control tool is older than the supported minimum.
    #[error("Incompatible control tool version {found}, need at least {required}")]
    IncompatibleVersion {
        /// Version reported by the tool.
        found: String,
        /// Minimum supported version.
        required: String,
    },

    /// Exporting APIs from the source platform failed.
    #[error("Export failed: {0}")]
    ExportFailed(String),

    /// An exported archive could not be read.
    #[error("Archive error: {0}")]
    ArchiveError(String),

    /// The description document is missing a required field.
    #[error("Missing field `{0}` in description document")]
    MissingField(&'static str),

    /// Failed to authenticate with the destination platform.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// API request failed.
    #[error("API request failed: {0}")]
    ApiError(String),

    /// Network error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Zip decoding error.
    #[error("Zip error: {0}")]
    ZipError(#[from] zip::result::ZipError),

    /// HTTP client error.
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrationError>;
