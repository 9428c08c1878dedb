//! Error types for the MCP client.

/// Result type for client operations.
pub type ClientResult<T> = Result<T, McpClientError>;

/// Error types that can occur when talking to an MCP server.
#[derive(Debug, thiserror::Error)]
pub enum McpClientError {
    /// A candidate endpoint could not be reached or answered non-2xx.
    #[error("Endpoint {endpoint} unreachable: {reason}")]
    EndpointUnreachable { endpoint: String, reason: String },

    /// A candidate answered 2xx but with a JSON-RPC error or a malformed body.
    #[error("Protocol error from {endpoint}: {message}")]
    Protocol { endpoint: String, message: String },

    /// A candidate did not answer in time.
    #[error("Request to {endpoint} timed out")]
    Timeout { endpoint: String },

    /// Every candidate endpoint failed.
    #[error("All {candidates} endpoints failed; last error: {last}")]
    ConnectionFailed { candidates: usize, last: String },

    /// Operation requires a connected client.
    #[error("Not connected")]
    NotConnected,

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP client construction or transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl McpClientError {
    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::EndpointUnreachable { .. }
            | Self::Timeout { .. }
            | Self::ConnectionFailed { .. }
            | Self::Http(_) => true,
            Self::Protocol { .. }
            | Self::NotConnected
            | Self::Config(_)
            | Self::Json(_)
            | Self::InvalidUrl(_) => false,
        }
    }

    /// Classify a reqwest failure against one endpoint.
    pub(crate) fn from_reqwest(endpoint: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                endpoint: endpoint.to_string(),
            }
        } else {
            Self::EndpointUnreachable {
                endpoint: endpoint.to_string(),
                reason: err.to_string(),
            }
        }
    }

    pub(crate) fn protocol(endpoint: &str, message: impl Into<String>) -> Self {
        Self::Protocol {
            endpoint: endpoint.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(McpClientError::Timeout {
            endpoint: "http://x".to_string()
        }
        .is_retryable());
        assert!(!McpClientError::protocol("http://x", "bad").is_retryable());
        assert!(!McpClientError::NotConnected.is_retryable());
    }

    #[test]
    fn test_connection_failed_message() {
        let err = McpClientError::ConnectionFailed {
            candidates: 6,
            last: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "All 6 endpoints failed; last error: boom");
    }
}
