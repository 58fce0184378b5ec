//! Exchange adapter error types
//!
//! All exchange-related errors are wrapped in ExchangeError enum
//! which implements thiserror for consistent error handling.

use thiserror::Error;

/// Exchange-specific error types for adapter operations
#[derive(Error, Debug)]
pub enum ExchangeError {
    /// Transport-level failure (DNS, connect, timeout, broken body)
    #[error("Network error: {0}")]
    Network(String),

    /// Exchange answered with a non-success status or an error payload
    #[error("Exchange API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Credentials were rejected by the exchange
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Invalid or unexpected response from exchange
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Market id is not listed on the exchange
    #[error("Unknown market: {0}")]
    UnknownMarket(String),

    /// Capability not provided by this adapter
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

impl ExchangeError {
    /// True when the exchange rejected the caller's credentials.
    ///
    /// Credential verification depends on telling this apart from
    /// transient transport or API failures.
    pub fn is_authentication(&self) -> bool {
        matches!(self, ExchangeError::Authentication(_))
    }
}

impl From<reqwest::Error> for ExchangeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ExchangeError::InvalidResponse(err.to_string())
        } else {
            ExchangeError::Network(err.to_string())
        }
    }
}

/// Result type alias for exchange operations
pub type ExchangeResult<T> = std::result::Result<T, ExchangeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_display() {
        let err = ExchangeError::Network("timeout".to_string());
        assert_eq!(err.to_string(), "Network error: timeout");
    }

    #[test]
    fn test_api_display() {
        let err = ExchangeError::Api {
            status: 429,
            message: "too many requests".to_string(),
        };
        assert_eq!(err.to_string(), "Exchange API error (429): too many requests");
    }

    #[test]
    fn test_authentication_is_distinguishable() {
        assert!(ExchangeError::Authentication("bad key".into()).is_authentication());
        assert!(!ExchangeError::Network("reset".into()).is_authentication());
        assert!(!ExchangeError::Unsupported("balance".into()).is_authentication());
    }
}
