//! Crunchyroll client error types
//!
//! Common error enum and body-reading utilities used by the client.

use thiserror::Error;

/// Maximum response body size for API calls (16 MB).
/// Prevents OOM from malicious or misconfigured upstream servers.
pub const MAX_RESPONSE_SIZE: usize = 16 * 1024 * 1024;

/// Error type for the Crunchyroll HTTP client.
#[derive(Debug, Error)]
pub enum CrunchyrollError {
    #[error("Network error: {0}")]
    Network(String),

    /// Remote API rejected the call. Carries the HTTP status and either the
    /// `message` field of the error body or the raw body text.
    #[error("API error ({status}): {message}")]
    Api {
        status: reqwest::StatusCode,
        message: String,
    },

    /// Credentials rejected by the token endpoint (`invalid_grant`).
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// An operation was invoked before `login` populated the required
    /// session state.
    #[error("Not authenticated: session config has no {0}")]
    NotAuthenticated(&'static str),

    /// Caller supplied a data shape the client cannot work with.
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid header value: {0}")]
    InvalidHeader(String),

    #[error("Response too large ({size} bytes, max {MAX_RESPONSE_SIZE})")]
    ResponseTooLarge { size: u64 },
}

/// Read a response body with a size limit.
///
/// Checks the `Content-Length` hint first (if available), then enforces the
/// limit on the actual body bytes.
pub async fn body_with_limit(response: reqwest::Response) -> Result<Vec<u8>, CrunchyrollError> {
    if let Some(cl) = response.content_length() {
        if cl as usize > MAX_RESPONSE_SIZE {
            return Err(CrunchyrollError::ResponseTooLarge { size: cl });
        }
    }
    let bytes = response.bytes().await?;
    if bytes.len() > MAX_RESPONSE_SIZE {
        return Err(CrunchyrollError::ResponseTooLarge {
            size: bytes.len() as u64,
        });
    }
    Ok(bytes.to_vec())
}

impl From<reqwest::Error> for CrunchyrollError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

impl From<serde_json::Error> for CrunchyrollError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<reqwest::header::InvalidHeaderValue> for CrunchyrollError {
    fn from(err: reqwest::header::InvalidHeaderValue) -> Self {
        Self::InvalidHeader(err.to_string())
    }
}
