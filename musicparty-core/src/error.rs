use thiserror::Error;

use crate::provider::ProviderError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ProviderError> for Error {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Auth { .. } => Self::Auth(err.to_string()),
            ProviderError::NotImplemented { .. } => Self::NotImplemented(err.to_string()),
            ProviderError::Upstream { .. } | ProviderError::Timeout { .. } => {
                Self::Upstream(err.to_string())
            }
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("Serialization error: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_mapping() {
        let auth = ProviderError::Auth {
            provider: "QQMusic",
            message: "cookie expired".to_string(),
        };
        assert!(matches!(Error::from(auth), Error::Auth(_)));

        let gap = ProviderError::NotImplemented {
            provider: "Bilibili",
            operation: "search_by_name",
        };
        assert!(matches!(Error::from(gap), Error::NotImplemented(_)));

        let timeout = ProviderError::Timeout {
            provider: "Netease",
            seconds: 15,
        };
        assert!(matches!(Error::from(timeout), Error::Upstream(_)));
    }
}
