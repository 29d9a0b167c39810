//! GitHub API error types.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::http::HttpError;

/// Errors that can occur when interacting with the GitHub API.
#[derive(Debug, Error)]
pub enum GitHubError {
    /// Connection-level failure (DNS, TLS, reset, timeout).
    #[error("Network error: {0}")]
    Network(#[from] HttpError),

    /// The body could not be parsed as JSON at all.
    #[error("Malformed response: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Non-success HTTP status.
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// Rate limit exceeded.
    #[error("Rate limit exceeded. Resets at {reset_at}")]
    RateLimited { reset_at: DateTime<Utc> },

    /// A well-formed GraphQL `errors` payload.
    #[error("GraphQL error: {}", messages.join("; "))]
    GraphQl { messages: Vec<String> },

    /// The response parsed but did not have the expected shape.
    #[error("Unexpected response shape: {0}")]
    Decode(String),
}

impl GitHubError {
    /// Create a decode error.
    #[inline]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// Whether the request should be retried transparently by the client.
    ///
    /// Transient: server errors (502/503/504), network failures, malformed
    /// bodies, and rate-limit exhaustion. Everything else is terminal for
    /// the request that produced it.
    #[inline]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Malformed(_) | Self::RateLimited { .. } => true,
            Self::Status { .. } => self.is_server_error(),
            Self::GraphQl { .. } | Self::Decode(_) => false,
        }
    }

    /// Whether this is a gateway-style server error eligible for backoff.
    #[inline]
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Status { status: 502..=504, .. })
    }

    /// Check if this error is a rate limit error.
    #[inline]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

/// Extract a short error message suitable for display.
///
/// Takes the first line of an error message, which keeps progress events
/// and log lines concise when a body is echoed back.
#[inline]
pub fn short_error_message(e: &impl std::error::Error) -> String {
    let full = e.to_string();
    full.lines().next().unwrap_or(&full).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(status: u16) -> GitHubError {
        GitHubError::Status {
            status,
            message: "x".to_string(),
        }
    }

    #[test]
    fn test_gateway_errors_are_transient() {
        for code in [502, 503, 504] {
            assert!(status(code).is_transient(), "{code} should be transient");
            assert!(status(code).is_server_error());
        }
    }

    #[test]
    fn test_other_statuses_are_terminal() {
        for code in [400, 401, 404, 500, 422] {
            assert!(!status(code).is_transient(), "{code} should be terminal");
        }
    }

    #[test]
    fn test_classification_of_remaining_kinds() {
        assert!(GitHubError::Network(HttpError::Transport("reset".into())).is_transient());

        let malformed = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(GitHubError::Malformed(malformed).is_transient());

        let limited = GitHubError::RateLimited {
            reset_at: Utc::now(),
        };
        assert!(limited.is_transient());
        assert!(limited.is_rate_limited());

        let gql = GitHubError::GraphQl {
            messages: vec!["Could not resolve to a Repository".into()],
        };
        assert!(!gql.is_transient());
        assert!(!GitHubError::decode("missing data").is_transient());
    }

    #[test]
    fn test_graphql_error_display_joins_messages() {
        let err = GitHubError::GraphQl {
            messages: vec!["first".into(), "second".into()],
        };
        assert_eq!(err.to_string(), "GraphQL error: first; second");
    }

    #[test]
    fn test_short_error_message_takes_first_line() {
        let err = GitHubError::Status {
            status: 502,
            message: "Bad Gateway\n<html>...</html>".to_string(),
        };
        assert_eq!(short_error_message(&err), "HTTP 502: Bad Gateway");
    }
}
