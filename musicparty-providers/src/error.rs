//! Shared upstream client error types
//!
//! Common error enum and response guards used by all catalog clients
//! (Netease, QQMusic, Bilibili).

use thiserror::Error;

/// Maximum response body size for upstream HTTP calls (8 MB).
/// Catalog metadata responses are small; anything bigger is misbehaving.
pub const MAX_RESPONSE_SIZE: usize = 8 * 1024 * 1024;

/// Common error type for all catalog HTTP clients.
#[derive(Debug, Error)]
pub enum ApiClientError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP error {status} for {url}")]
    Http { status: reqwest::StatusCode, url: String },

    #[error("API error (code {code}): {message}")]
    Api { code: i64, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Response too large ({size} bytes, max {MAX_RESPONSE_SIZE})")]
    ResponseTooLarge { size: u64 },
}

impl ApiClientError {
    /// Build an `Api` error from a response envelope, keeping the raw body
    /// around so the upstream diagnostic survives into the logs.
    pub fn api(code: i64, body: &serde_json::Value) -> Self {
        let message = body["message"]
            .as_str()
            .map_or_else(|| body.to_string(), ToString::to_string);
        Self::Api { code, message }
    }
}

/// Read a response body with size limit and deserialize as JSON.
///
/// Checks the `Content-Length` hint first (if available), then enforces the
/// limit on the actual body bytes before deserializing.
pub async fn json_with_limit<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ApiClientError> {
    if let Some(cl) = response.content_length() {
        if cl as usize > MAX_RESPONSE_SIZE {
            return Err(ApiClientError::ResponseTooLarge { size: cl });
        }
    }
    let bytes = response.bytes().await?;
    if bytes.len() > MAX_RESPONSE_SIZE {
        return Err(ApiClientError::ResponseTooLarge { size: bytes.len() as u64 });
    }
    serde_json::from_slice(&bytes).map_err(Into::into)
}

/// Check HTTP response status before processing the body.
pub fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, ApiClientError> {
    let status = resp.status();
    if status.is_client_error() || status.is_server_error() {
        return Err(ApiClientError::Http {
            status,
            url: resp.url().to_string(),
        });
    }
    Ok(resp)
}

impl From<reqwest::Error> for ApiClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

impl From<serde_json::Error> for ApiClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}
