//! Error types for wp-monitor

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while configuring or running the monitor
///
/// Failures of individual checks never surface here: they degrade to the
/// sentinel value of the field they feed (see [`crate::directory::Lookup`]).
#[derive(Debug, Error)]
pub enum Error {
    /// Required setting missing or empty
    #[error("missing required setting: {0}")]
    MissingSetting(&'static str),

    /// Invalid URL provided
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Unknown reporting timezone
    #[error("invalid timezone: '{0}'")]
    InvalidTimezone(String),

    /// Numeric setting that does not parse
    #[error("invalid value for {0}: '{1}'")]
    InvalidNumber(&'static str, String),

    /// Malformed email address
    #[error("invalid email address '{0}'")]
    InvalidAddress(String),

    /// Invalid output format specified
    #[error("invalid output format: '{0}' (valid: human, json, none)")]
    InvalidOutputFormat(String),

    /// Failed to create HTTP client
    #[error("failed to create HTTP client: {0}")]
    HttpClient(String),

    /// Building or sending the report email failed
    #[error("mail delivery failed: {0}")]
    Mail(String),

    /// Output operation failed
    #[error("output failed: {0}")]
    OutputFailed(#[source] std::io::Error),

    /// JSON serialization failed
    #[error("JSON serialization failed")]
    SerializationFailed(#[from] serde_json::Error),
}
