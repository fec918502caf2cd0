use thiserror::Error;

use crate::transaction::{AuthenticationTransaction, TransactionStatus};

#[derive(Error, Debug)]
pub enum AuthnError {
    /// A verify request was rejected locally, before any transport call:
    /// a required field is missing or the request variant does not match
    /// the target factor.
    #[error("invalid verify request: {0}")]
    Validation(String),

    /// The server reply is missing a required field or is otherwise
    /// structurally unusable.
    #[error("malformed server response: {0}")]
    MalformedResponse(String),

    /// The invoked action is not in the transaction's current link set.
    #[error("illegal transition: `{action}` is not available in state {state}")]
    IllegalTransition {
        state: TransactionStatus,
        action: String,
    },

    /// Network or transport-level failure, including timeouts.
    #[error("transport error: {0}")]
    Transport(String),

    #[cfg(feature = "network")]
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server rejected the credentials or factor proof. The embedded
    /// transaction is still live; the caller may retry from it.
    #[error("authentication failed: {summary}")]
    AuthenticationFailed {
        summary: String,
        transaction: Box<AuthenticationTransaction>,
    },
}

pub type Result<T> = std::result::Result<T, AuthnError>;
