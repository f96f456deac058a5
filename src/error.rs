//! Error types for the Constellation long-poll client.
//!
//! Every fallible operation returns [`Result<T>`]. Nothing here is fatal: the
//! engine always hands control back to the caller, and the caller's next tick
//! is the retry.
//!
//! | Variant | Raised when | Recovery |
//! |---------|-------------|----------|
//! | [`Transport`](ConstellationError::Transport) | connect/read/write failed | retried next tick |
//! | [`Timeout`](ConstellationError::Timeout) | no first byte within the request timeout | retried next tick |
//! | [`Protocol`](ConstellationError::Protocol) | malformed status line or headers | response discarded |
//! | [`TruncatedBody`](ConstellationError::TruncatedBody) | broken chunk framing or mid-chunk disconnect | response discarded |
//! | [`Server`](ConstellationError::Server) | status 500 on a long-poll channel | full renewal pass |
//! | [`Credential`](ConstellationError::Credential) | subscribe call answered `null` | surfaced to the caller |

use crate::types::SubscriptionKind;
use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ConstellationError>;

/// Errors raised while talking to a Constellation hub.
#[derive(Debug, Error)]
pub enum ConstellationError {
    /// Read or write on the transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// The transport could not be (re)connected.
    #[error("unable to establish the TCP connection to {host}:{port}")]
    NotConnected {
        /// Hub host name
        host: String,
        /// Hub port
        port: u16,
    },

    /// The post-connect verification hook refused the connection.
    #[error("network client connection rejected by verification hook")]
    ConnectionRejected,

    /// No response byte arrived within the request timeout.
    #[error("HTTP timeout reached after {0:?}")]
    Timeout(Duration),

    /// Malformed status line, header or chunk-size line.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Chunked framing broke or the peer went away mid-chunk.
    ///
    /// `partial` holds every body byte read before the failure.
    #[error("truncated response body (status {status}, {} bytes read)", partial.len())]
    TruncatedBody {
        /// Status code from the response head
        status: u16,
        /// Body bytes received before the failure
        partial: Bytes,
    },

    /// The body was not the JSON the endpoint promises.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The hub reported an internal failure on a long-poll channel.
    #[error("internal server error ({0}) on long-poll channel")]
    Server(u16),

    /// Any other status that the operation did not expect.
    #[error("incorrect response: {status}")]
    UnexpectedStatus {
        /// The HTTP status code
        status: u16,
        /// The response body, if one was read
        body: String,
    },

    /// A subscribe call returned `null`: the identity or access key was refused.
    #[error("subscription refused: check your credentials")]
    Credential,

    /// The subscribe call answered with something that is not a quoted id.
    #[error("invalid subscription id: {0:?}")]
    InvalidSubscriptionId(String),

    /// The operation needs a subscription that does not exist yet.
    #[error("no {0} subscription")]
    NotSubscribed(SubscriptionKind),
}

impl ConstellationError {
    /// HTTP status carried by this error, or 0 when no status line was read.
    pub fn status(&self) -> u16 {
        match self {
            ConstellationError::TruncatedBody { status, .. }
            | ConstellationError::UnexpectedStatus { status, .. } => *status,
            ConstellationError::Server(status) => *status,
            _ => 0,
        }
    }

    /// Whether trying again on a later tick can succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ConstellationError::Transport(_)
            | ConstellationError::NotConnected { .. }
            | ConstellationError::Timeout(_)
            | ConstellationError::TruncatedBody { .. }
            | ConstellationError::Server(_) => true,
            ConstellationError::UnexpectedStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Whether this error asks for a subscription renewal pass.
    pub fn is_server_error(&self) -> bool {
        matches!(self, ConstellationError::Server(_))
    }
}
