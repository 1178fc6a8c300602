//! Error types for prbot-host

use thiserror::Error;

/// Errors returned by a repository host.
///
/// Every variant is an external-service failure from the point of view of
/// the decision engine: it is propagated, never retried here.
#[derive(Error, Debug)]
pub enum HostError {
    /// The API answered with a non-success status
    #[error("API request to {endpoint} failed ({status}): {message}")]
    Api {
        status: u16,
        endpoint: String,
        message: String,
    },

    /// Token missing, invalid, or lacking permission
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Primary or secondary rate limit hit
    #[error("Rate limit exceeded for {endpoint}")]
    RateLimited { endpoint: String },

    /// The request never produced a response
    #[error("Network error: {0}")]
    Network(String),

    /// The response body did not match the expected shape
    #[error("Failed to decode response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    /// The addressed resource does not exist
    #[error("Not found: {resource}")]
    NotFound { resource: String },

    /// Client could not be constructed
    #[error("Invalid host configuration: {0}")]
    Config(String),
}

impl HostError {
    /// Whether the host reported the resource as absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, HostError::NotFound { .. })
    }
}

impl From<reqwest::Error> for HostError {
    fn from(err: reqwest::Error) -> Self {
        HostError::Network(err.to_string())
    }
}
