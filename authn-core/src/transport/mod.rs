//! Transport seam between the state machine and the network.
//!
//! A [`Transport`] performs exactly one submission per call: no retries, no
//! interpretation of the body. Structured non-2xx bodies (wrong pass code,
//! lockout) are ordinary [`TransportReply`] values; only network-level
//! failures surface as errors.

#[cfg(feature = "network")]
mod http;
mod mock;

#[cfg(feature = "network")]
pub use http::{HttpTransport, HttpTransportConfig};
pub use mock::{MockTransport, RecordedCall};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// HTTP method subset the authentication API uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Delete,
}

/// Target of one transport submission, usually taken from a server link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub method: Method,
    pub href: String,
}

impl Operation {
    pub fn get(href: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            href: href.into(),
        }
    }

    pub fn post(href: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            href: href.into(),
        }
    }
}

/// Raw reply from the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportReply {
    pub status: u16,
    pub body: Value,
}

impl TransportReply {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn ok(body: Value) -> Self {
        Self::new(200, body)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Single-shot request submission.
///
/// Implementations must be thread-safe (`Send + Sync`); retry policy belongs
/// to the caller, and timeouts belong to the implementation, surfaced as
/// [`crate::AuthnError::Transport`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn submit(&self, operation: &Operation, payload: Option<&Value>)
        -> Result<TransportReply>;
}
