//! Error types

use thiserror::Error;

/// Result type alias for azfwsync operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Token acquisition failed or credentials are missing
    #[error("authentication error: {0}")]
    Auth(String),

    /// Error body returned by the Azure Resource Manager API
    #[error("ARM API error {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// External IP lookup failed or returned something that is not IPv4
    #[error("IP lookup error: {0}")]
    IpLookup(String),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Invalid or incomplete configuration
    #[error("configuration error: {0}")]
    Config(String),
}
