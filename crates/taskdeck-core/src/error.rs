//! Error types for taskdeck-core

use std::time::Duration;

use thiserror::Error;

/// Result type alias using taskdeck-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in taskdeck-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP transport error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Remote service answered with a non-success status
    #[error("Remote API error: {message} ({status})")]
    Api { status: u16, message: String },

    /// Remote call did not finish in time
    #[error("Remote {operation} timed out after {}s", .after.as_secs())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// Remote answered with a payload we could not interpret
    #[error("Malformed remote response: {0}")]
    MalformedResponse(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Entity or conflict not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether the failure is worth another attempt on a later flush.
    ///
    /// Non-transient push failures drop the change at once instead of
    /// spending its retry budget. Auth answers count as transient since a
    /// fresh token fixes them.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) | Self::Timeout { .. } | Self::Io(_) => true,
            Self::Api { status, .. } => matches!(*status, 401 | 403 | 408 | 429 | 500..),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_transient() {
        let error = Error::Api {
            status: 503,
            message: "unavailable".to_string(),
        };
        assert!(error.is_transient());
        assert!(Error::Api {
            status: 401,
            message: "token expired".to_string(),
        }
        .is_transient());
    }

    #[test]
    fn client_errors_are_not_transient() {
        let error = Error::Api {
            status: 422,
            message: "bad payload".to_string(),
        };
        assert!(!error.is_transient());
        assert!(!Error::MalformedResponse("nope".to_string()).is_transient());
        assert!(!Error::InvalidInput("task has no payload".to_string()).is_transient());
    }

    #[test]
    fn timeout_message_names_operation() {
        let error = Error::Timeout {
            operation: "pull",
            after: Duration::from_secs(15),
        };
        assert_eq!(error.to_string(), "Remote pull timed out after 15s");
    }
}
