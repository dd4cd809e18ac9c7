//! Error types for the chatwire client.
//!
//! Every failure above the frame-parsing level lands in [`ClientError`].
//! Malformed stream frames and cancellation have no variant here: the
//! former are dropped, the latter resolves through the done path.

use thiserror::Error;

/// A result type using `ClientError`.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur while talking to the chat backend.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The endpoint could not be resolved to a URL against the base address.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// The request body could not be encoded.
    #[error("failed to encode request: {0}")]
    Encode(#[source] serde_json::Error),

    /// Transport-level failure: DNS, connection refused, timeout, broken body read.
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    /// The transport did not yield a well-formed HTTP response.
    #[error("invalid response from server: {0}")]
    InvalidResponse(String),

    /// The server answered with a status outside `200..300`.
    #[error("HTTP error: {status}")]
    HttpStatus {
        /// The HTTP status code.
        status: u16,
        /// The response body, when it could be read.
        body: Option<String>,
    },

    /// A JSON response body could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(#[source] serde_json::Error),

    /// The client configuration is unusable.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Returns the HTTP status code carried by this error, if any.
    #[must_use]
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns `true` for transport-level failures.
    #[must_use]
    pub const fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// Returns `true` if a caller might reasonably retry.
    ///
    /// Advisory only. Nothing in this crate retries on its own.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl ClientError {
    /// Classify a failure to obtain a response.
    ///
    /// A reply that hyper could not parse, or a connection closed before
    /// the response head arrived, becomes `InvalidResponse`.
    pub(crate) fn from_send(err: reqwest::Error) -> Self {
        if err.is_builder() {
            Self::InvalidUrl(err.to_string())
        } else if err.is_decode() || err.is_body() || err.is_redirect() || is_malformed_reply(&err)
        {
            Self::InvalidResponse(err.to_string())
        } else {
            Self::Network(err)
        }
    }
}

fn is_malformed_reply(err: &reqwest::Error) -> bool {
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        if let Some(hyper_err) = cause.downcast_ref::<hyper::Error>() {
            return hyper_err.is_parse() || hyper_err.is_incomplete_message();
        }
        source = cause.source();
    }
    false
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            Self::InvalidUrl(err.to_string())
        } else {
            Self::Network(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn json_error() -> serde_json::Error {
        serde_json::from_str::<serde_json::Value>("{").unwrap_err()
    }

    #[test]
    fn status_code_only_for_http_status() {
        let err = ClientError::HttpStatus {
            status: 404,
            body: Some("missing".into()),
        };
        assert_eq!(err.status_code(), Some(404));
        assert_eq!(ClientError::InvalidUrl("x".into()).status_code(), None);
        assert_eq!(ClientError::Decode(json_error()).status_code(), None);
    }

    #[test]
    fn retriable_classification() {
        let server = ClientError::HttpStatus {
            status: 503,
            body: None,
        };
        let throttled = ClientError::HttpStatus {
            status: 429,
            body: None,
        };
        let client = ClientError::HttpStatus {
            status: 400,
            body: None,
        };
        assert!(server.is_retriable());
        assert!(throttled.is_retriable());
        assert!(!client.is_retriable());
        assert!(!ClientError::Encode(json_error()).is_retriable());
        assert!(!ClientError::InvalidResponse("eof".into()).is_network());
    }

    #[test]
    fn display_messages() {
        let err = ClientError::HttpStatus {
            status: 500,
            body: None,
        };
        assert_eq!(err.to_string(), "HTTP error: 500");
        assert_eq!(
            ClientError::InvalidUrl("conversations/%zz".into()).to_string(),
            "invalid URL: conversations/%zz"
        );
    }
}
