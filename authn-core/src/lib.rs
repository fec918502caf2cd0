//! authn-core - client-side state machine for a multi-step authentication API
//!
//! This crate drives a server-side authentication transaction through its
//! states (primary credentials, factor challenge, factor verification,
//! success or lockout) with typed request and response marshaling.
//!
//! # Design
//!
//! - Each server round-trip yields a fresh, immutable
//!   [`AuthenticationTransaction`] snapshot; flow operations consume the
//!   snapshot they advance, so one transaction can never have two
//!   submissions in flight.
//! - Transitions are driven exclusively by the server's `status` field and
//!   its advertised `_links`; invoking an action the server did not offer
//!   fails locally with [`AuthnError::IllegalTransition`].
//! - Factor kinds are open-ended: unrecognized `factorType` discriminators
//!   decode into a fallback variant instead of breaking the client.
//! - The network sits behind the [`Transport`] trait; [`MockTransport`]
//!   scripts replies for tests, [`HttpTransport`] (feature `network`,
//!   default on) does real HTTPS.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use authn_core::{AuthnClient, HttpTransport, TransactionStatus, VerifyFactorRequest};
//!
//! # async fn example() -> authn_core::Result<()> {
//! let transport = Arc::new(HttpTransport::new()?);
//! let client = AuthnClient::new("https://id.example.com", transport);
//!
//! let mut txn = client.authenticate("jdoe", "correct horse battery staple").await?;
//!
//! if txn.status() == TransactionStatus::MfaRequired {
//!     let factor_id = txn.factors()[0].id().to_string();
//!     txn = client.challenge(txn, &factor_id).await?;
//!     txn = client
//!         .verify_factor(txn, &factor_id, VerifyFactorRequest::otp().pass_code("123456"))
//!         .await?;
//! }
//!
//! if txn.status() == TransactionStatus::Success {
//!     let _session_token = txn.session_token();
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod factor;
pub mod registry;
pub mod request;
pub mod transaction;
pub mod transport;

// Re-export main types for convenience
pub use client::AuthnClient;
pub use error::{AuthnError, Result};
pub use factor::{Factor, FactorKind, FactorProfile};
pub use registry::{FactorEntry, FactorRegistry};
pub use request::{
    GenericVerify, OtpVerify, PasswordVerify, PushVerify, QuestionVerify, RequestKind, U2fVerify,
    VerifyFactorRequest, WebAuthnVerify,
};
pub use transaction::{AuthenticationTransaction, Link, LinkHints, Links, TransactionStatus};
pub use transport::{MockTransport, Method, Operation, RecordedCall, Transport, TransportReply};

#[cfg(feature = "network")]
pub use transport::{HttpTransport, HttpTransportConfig};
