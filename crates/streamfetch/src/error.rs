//! Error type shared by the unary and streaming call paths.
//!
//! Every failure is surfaced exactly once through [`ClientError`]. Nothing in
//! this crate retries: a failed send or a rejected status is handed straight
//! back to the caller.

use crate::api::response::{RawResponse, ResponseError};

/// Message carried by [`ClientError::Cancelled`].
pub const ABORT_MESSAGE: &str = "AbortError: The user aborted a request.";

/// Failure of a single call.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The request could not be assembled (bad header, bad URL, or a
    /// structured body without JSON serialization).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The send or a body read failed before a usable response arrived.
    /// The message includes the whole source chain.
    #[error("request failed: {}", error_chain(.0))]
    Transport(#[source] reqwest::Error),

    /// The caller (or a navigation teardown) aborted the request.
    #[error("AbortError: The user aborted a request.")]
    Cancelled,

    /// HTTP 401. The raw response is handed back so the caller can drive
    /// re-authentication.
    #[error("HTTP 401: unauthorized")]
    Unauthorized(RawResponse),

    /// HTTP 403 with the decoded error body.
    #[error("HTTP 403: {error}")]
    Forbidden {
        error: ResponseError,
        response: RawResponse,
    },

    /// Any other status outside 2xx/3xx.
    #[error("HTTP {}: {error}", .response.status)]
    Status {
        error: ResponseError,
        response: RawResponse,
    },

    /// A response body could not be decoded as JSON.
    #[error("failed to decode response: {0}")]
    Decode(String),
}

/// Render an error followed by each of its sources, joined with `": "`.
///
/// A source whose text is already part of the message so far is skipped.
pub fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !text.is_empty() && !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

impl ClientError {
    /// HTTP status attached to this error, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Unauthorized(response) => Some(response.status),
            ClientError::Forbidden { response, .. } | ClientError::Status { response, .. } => {
                Some(response.status)
            }
            ClientError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// The raw response a status rejection carries.
    pub fn response(&self) -> Option<&RawResponse> {
        match self {
            ClientError::Unauthorized(response)
            | ClientError::Forbidden { response, .. }
            | ClientError::Status { response, .. } => Some(response),
            _ => None,
        }
    }

    /// Whether this error came from an abort rather than a fault.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ClientError::Cancelled)
    }
}
