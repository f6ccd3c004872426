// Provider Error Types

use musicparty_providers::ApiClientError;

/// Provider-specific errors
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The provider's credential is invalid or expired. Fatal to that
    /// provider's further calls until re-bound, not to the party.
    #[error("{provider} authentication failed: {message}")]
    Auth {
        provider: &'static str,
        message: String,
    },

    /// Upstream rejected or botched the call; the diagnostic string keeps
    /// whatever the upstream said.
    #[error("{provider} upstream error: {message}")]
    Upstream {
        provider: &'static str,
        message: String,
    },

    /// Declared capability gap, not a bug.
    #[error("{provider} does not implement {operation}")]
    NotImplemented {
        provider: &'static str,
        operation: &'static str,
    },

    #[error("{provider} call timed out after {seconds}s")]
    Timeout {
        provider: &'static str,
        seconds: u64,
    },
}

impl ProviderError {
    pub fn upstream(provider: &'static str, message: impl std::fmt::Display) -> Self {
        Self::Upstream {
            provider,
            message: message.to_string(),
        }
    }

    #[must_use]
    pub const fn not_implemented(provider: &'static str, operation: &'static str) -> Self {
        Self::NotImplemented {
            provider,
            operation,
        }
    }

    /// Classify a client error, preserving its diagnostic.
    pub fn from_client(provider: &'static str, err: ApiClientError) -> Self {
        match err {
            ApiClientError::Auth(message) => Self::Auth { provider, message },
            other => Self::Upstream {
                provider,
                message: other.to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, ProviderError>;
