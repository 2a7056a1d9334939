use thiserror::Error;

/// Error types for the machine translation providers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MtError {
    /// Missing or rejected credentials, bad endpoint, 4xx responses
    #[error("Configuration error: {0}")]
    ConfigError(String),
    /// Transport-level failure talking to the provider
    #[error("Network error: {0}")]
    NetworkError(String),
    /// The provider asked us to slow down (HTTP 429)
    #[error("Rate limited: {0}")]
    RateLimited(String),
    /// The provider failed or returned something we cannot use
    #[error("Translation error: {0}")]
    TranslationError(String),
    /// Locale code with characters outside `[A-Za-z0-9_-]`
    #[error("Invalid locale: {0}")]
    InvalidLocale(String),
    #[error("{0}")]
    Other(String),
}

/// The request URL is dropped from the message; it can carry credentials.
impl From<reqwest::Error> for MtError {
    fn from(err: reqwest::Error) -> Self {
        let err = err.without_url();
        if err.is_timeout() {
            MtError::NetworkError(format!("request timed out: {}", err))
        } else if err.is_decode() {
            MtError::TranslationError(format!("malformed response: {}", err))
        } else {
            MtError::NetworkError(err.to_string())
        }
    }
}

/// Result type for MT operations
pub type MtResult<T> = Result<T, MtError>;
