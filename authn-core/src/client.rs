//! The authentication flow driver.
//!
//! [`AuthnClient`] advances [`AuthenticationTransaction`] snapshots through
//! the server-driven flow. Transitions come exclusively from the `status`
//! field of each server response plus the link the caller invoked; nothing is
//! inferred locally. Flow operations consume the snapshot they are given and
//! return a new one, so submissions against one transaction are serialized by
//! ownership even in a multi-threaded caller.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use crate::error::{AuthnError, Result};
use crate::factor::Factor;
use crate::registry::FactorRegistry;
use crate::request::VerifyFactorRequest;
use crate::transaction::{AuthenticationTransaction, TransactionStatus};
use crate::transport::{Operation, Transport, TransportReply};

const LINK_VERIFY: &str = "verify";
const LINK_RESEND: &str = "resend";
const LINK_CANCEL: &str = "cancel";
const LINK_PREV: &str = "prev";

/// Server error code for a locked-out user. Any other structured error code
/// is treated as a recoverable authentication failure.
const CODE_LOCKED_OUT: &str = "E0000069";

/// Client for a multi-step authentication API.
///
/// Holds no per-transaction state: independent transactions may be advanced
/// concurrently through one shared client.
pub struct AuthnClient {
    org_url: String,
    transport: Arc<dyn Transport>,
    registry: FactorRegistry,
}

impl AuthnClient {
    /// `org_url` is the API origin, e.g. `https://id.example.com`.
    pub fn new(org_url: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        let org_url = org_url.into().trim_end_matches('/').to_string();
        Self {
            org_url,
            transport,
            registry: FactorRegistry::new(),
        }
    }

    /// Replace the default factor registry, e.g. to accept extra factor
    /// kinds server-side deployments advertise.
    pub fn with_registry(mut self, registry: FactorRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &FactorRegistry {
        &self.registry
    }

    fn authn_url(&self) -> String {
        format!("{}/api/v1/authn", self.org_url)
    }

    /// Begin a fresh transaction with primary credentials.
    ///
    /// Invalid credentials surface as [`AuthnError::AuthenticationFailed`]
    /// carrying an `UNAUTHENTICATED` snapshot to retry from.
    #[instrument(level = "info", skip_all, fields(username = %username))]
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AuthenticationTransaction> {
        let payload = json!({ "username": username, "password": password });
        let reply = self
            .transport
            .submit(&Operation::post(self.authn_url()), Some(&payload))
            .await?;
        self.advance(reply, None)
    }

    /// Restore a transaction from a persisted state token.
    #[instrument(level = "info", skip_all)]
    pub async fn resume(&self, state_token: &str) -> Result<AuthenticationTransaction> {
        let payload = json!({ "stateToken": state_token });
        let reply = self
            .transport
            .submit(&Operation::post(self.authn_url()), Some(&payload))
            .await?;
        self.advance(reply, None)
    }

    /// Ask the server to issue a challenge for one of the transaction's
    /// factors (`MFA_REQUIRED` to `MFA_CHALLENGE`). This is how a caller
    /// selects a factor; no proof fields are sent.
    #[instrument(level = "info", skip(self, transaction), fields(factor_id = %factor_id))]
    pub async fn challenge(
        &self,
        transaction: AuthenticationTransaction,
        factor_id: &str,
    ) -> Result<AuthenticationTransaction> {
        let href = self.verify_href(&transaction, factor_id)?;
        let token = state_token_of(&transaction)?;
        let payload = json!({ "stateToken": token });

        let reply = self
            .transport
            .submit(&Operation::post(href), Some(&payload))
            .await?;
        self.advance(reply, Some(transaction))
    }

    /// Submit a factor verification proof.
    ///
    /// The request variant must structurally match the target factor's kind
    /// and carry all of its required fields; either failure is an
    /// [`AuthnError::Validation`] raised before any transport call. A wrong
    /// proof comes back as [`AuthnError::AuthenticationFailed`] with a
    /// retryable snapshot; lockout comes back as an `Ok` terminal
    /// `LOCKED_OUT` snapshot.
    #[instrument(level = "info", skip(self, transaction, request), fields(factor_id = %factor_id))]
    pub async fn verify_factor(
        &self,
        transaction: AuthenticationTransaction,
        factor_id: &str,
        request: impl Into<VerifyFactorRequest>,
    ) -> Result<AuthenticationTransaction> {
        let request = request.into();

        let href = {
            let factor = self.challengeable_factor(&transaction, factor_id)?;
            if !self.registry.request_matches(factor.kind(), &request) {
                return Err(AuthnError::Validation(format!(
                    "a {} request cannot verify a {} factor",
                    request.kind(),
                    factor.kind()
                )));
            }
            self.verify_link_href(&transaction, factor_id)?
        };

        // Lazy validation: missing required fields fail here, pre-transport.
        let mut fields = request.wire_fields()?;
        let token = state_token_of(&transaction)?;
        fields.insert("stateToken".to_string(), Value::String(token));

        debug!(factor_id, "submitting factor verification");
        let reply = self
            .transport
            .submit(&Operation::post(href), Some(&Value::Object(fields)))
            .await?;
        self.advance(reply, Some(transaction))
    }

    /// Ask the server to resend an out-of-band challenge (SMS, call, push).
    #[instrument(level = "info", skip(self, transaction), fields(factor_id = %factor_id))]
    pub async fn resend(
        &self,
        transaction: AuthenticationTransaction,
        factor_id: &str,
    ) -> Result<AuthenticationTransaction> {
        let href = {
            let factor = transaction.factor(factor_id).ok_or_else(|| {
                AuthnError::Validation(format!(
                    "transaction has no factor with id `{factor_id}`"
                ))
            })?;
            let link = factor.links().get(LINK_RESEND).ok_or_else(|| {
                illegal(transaction.status(), LINK_RESEND)
            })?;
            link.href.clone()
        };

        let token = state_token_of(&transaction)?;
        let payload = json!({ "stateToken": token });
        let reply = self
            .transport
            .submit(&Operation::post(href), Some(&payload))
            .await?;
        self.advance(reply, Some(transaction))
    }

    /// Abandon the transaction server-side via its `cancel` link.
    #[instrument(level = "info", skip_all)]
    pub async fn cancel(
        &self,
        transaction: AuthenticationTransaction,
    ) -> Result<AuthenticationTransaction> {
        let reply = self.follow(&transaction, LINK_CANCEL).await?;
        if reply.is_success() {
            // The server discards the transaction and replies with an empty
            // body; hand back a fresh snapshot.
            info!("transaction cancelled");
            return Ok(AuthenticationTransaction::unauthenticated());
        }
        self.advance(reply, Some(transaction))
    }

    /// Step back to the previous state via the `prev` link.
    #[instrument(level = "info", skip_all)]
    pub async fn previous(
        &self,
        transaction: AuthenticationTransaction,
    ) -> Result<AuthenticationTransaction> {
        let reply = self.follow(&transaction, LINK_PREV).await?;
        self.advance(reply, Some(transaction))
    }

    /// Invoke a transaction-level link with the bare state token payload.
    async fn follow(
        &self,
        transaction: &AuthenticationTransaction,
        rel: &str,
    ) -> Result<TransportReply> {
        let link = transaction
            .links()
            .get(rel)
            .ok_or_else(|| illegal(transaction.status(), rel))?;
        let href = link.href.clone();
        let token = state_token_of(transaction)?;
        let payload = json!({ "stateToken": token });
        self.transport
            .submit(&Operation::post(href), Some(&payload))
            .await
    }

    fn challengeable_factor<'t>(
        &self,
        transaction: &'t AuthenticationTransaction,
        factor_id: &str,
    ) -> Result<&'t Factor> {
        match transaction.status() {
            TransactionStatus::MfaRequired | TransactionStatus::MfaChallenge => {}
            status => return Err(illegal(status, LINK_VERIFY)),
        }
        transaction.factor(factor_id).ok_or_else(|| {
            AuthnError::Validation(format!("transaction has no factor with id `{factor_id}`"))
        })
    }

    fn verify_href(
        &self,
        transaction: &AuthenticationTransaction,
        factor_id: &str,
    ) -> Result<String> {
        self.challengeable_factor(transaction, factor_id)?;
        self.verify_link_href(transaction, factor_id)
    }

    fn verify_link_href(
        &self,
        transaction: &AuthenticationTransaction,
        factor_id: &str,
    ) -> Result<String> {
        let factor = transaction.factor(factor_id).ok_or_else(|| {
            AuthnError::Validation(format!("transaction has no factor with id `{factor_id}`"))
        })?;
        let link = factor
            .links()
            .get(LINK_VERIFY)
            .ok_or_else(|| illegal(transaction.status(), LINK_VERIFY))?;
        Ok(link.href.clone())
    }

    /// Interpret a transport reply. 2xx bodies parse into the next snapshot;
    /// structured error bodies map onto the error taxonomy, with `retry` as
    /// the snapshot handed back for recoverable authentication failures.
    fn advance(
        &self,
        reply: TransportReply,
        retry: Option<AuthenticationTransaction>,
    ) -> Result<AuthenticationTransaction> {
        if reply.is_success() {
            let txn = AuthenticationTransaction::from_body(&reply.body, &self.registry)?;
            info!(status = %txn.status(), "transaction advanced");
            return Ok(txn);
        }

        // Some deployments report lockout as an error body carrying the
        // terminal status directly.
        if reply.body.get("status").and_then(Value::as_str) == Some("LOCKED_OUT") {
            warn!("user locked out");
            return Ok(AuthenticationTransaction::locked_out());
        }

        match ApiError::from_body(&reply.body) {
            Some(api) if api.error_code == CODE_LOCKED_OUT => {
                warn!(code = %api.error_code, "user locked out");
                Ok(AuthenticationTransaction::locked_out())
            }
            Some(api) => {
                debug!(code = %api.error_code, status = reply.status, "server rejected submission");
                Err(AuthnError::AuthenticationFailed {
                    summary: api.summary(),
                    transaction: Box::new(
                        retry.unwrap_or_else(AuthenticationTransaction::unauthenticated),
                    ),
                })
            }
            None => Err(AuthnError::MalformedResponse(format!(
                "non-success reply ({}) without a recognizable error body",
                reply.status
            ))),
        }
    }
}

fn illegal(state: TransactionStatus, action: &str) -> AuthnError {
    AuthnError::IllegalTransition {
        state,
        action: action.to_string(),
    }
}

fn state_token_of(transaction: &AuthenticationTransaction) -> Result<String> {
    transaction
        .state_token()
        .map(str::to_string)
        .ok_or_else(|| AuthnError::Validation("transaction has no state token".to_string()))
}

/// Structured error body the API returns with non-2xx statuses.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiError {
    error_code: String,
    #[serde(default)]
    error_summary: Option<String>,
    #[serde(default)]
    error_causes: Vec<ApiErrorCause>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiErrorCause {
    #[serde(default)]
    error_summary: Option<String>,
}

impl ApiError {
    fn from_body(body: &Value) -> Option<Self> {
        serde_json::from_value(body.clone()).ok()
    }

    fn summary(&self) -> String {
        self.error_summary
            .clone()
            .or_else(|| {
                self.error_causes
                    .first()
                    .and_then(|c| c.error_summary.clone())
            })
            .unwrap_or_else(|| self.error_code.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::transport::MockTransport;

    fn client(mock: Arc<MockTransport>) -> AuthnClient {
        AuthnClient::new("https://id.example.com/", mock)
    }

    fn challenge_body(factor_type: &str) -> Value {
        json!({
            "stateToken": "tok-challenge",
            "status": "MFA_CHALLENGE",
            "_embedded": {
                "factor": {
                    "id": "fct1",
                    "factorType": factor_type,
                    "_links": {
                        "verify": { "href": "https://id.example.com/api/v1/authn/factors/fct1/verify" }
                    }
                }
            },
            "_links": {
                "cancel": { "href": "https://id.example.com/api/v1/authn/cancel" },
                "prev": { "href": "https://id.example.com/api/v1/authn/previous" }
            }
        })
    }

    fn challenge_txn(factor_type: &str) -> AuthenticationTransaction {
        AuthenticationTransaction::from_body(&challenge_body(factor_type), &FactorRegistry::new())
            .unwrap()
    }

    #[tokio::test]
    async fn org_url_is_trimmed() {
        let mock = Arc::new(MockTransport::new());
        mock.enqueue_ok(json!({ "stateToken": "tok", "status": "MFA_REQUIRED" }));
        let client = client(Arc::clone(&mock));

        client.authenticate("jdoe", "hunter2").await.unwrap();
        assert_eq!(
            mock.calls()[0].operation.href,
            "https://id.example.com/api/v1/authn"
        );
    }

    #[tokio::test]
    async fn mismatched_request_fails_before_transport() {
        let mock = Arc::new(MockTransport::new());
        let client = client(Arc::clone(&mock));
        let txn = challenge_txn("webauthn");

        let err = client
            .verify_factor(txn, "fct1", VerifyFactorRequest::otp().pass_code("123456"))
            .await
            .unwrap_err();

        assert!(matches!(err, AuthnError::Validation(_)));
        assert_eq!(mock.call_count(), 0, "transport must not be touched");
    }

    #[tokio::test]
    async fn missing_proof_field_fails_before_transport() {
        let mock = Arc::new(MockTransport::new());
        let client = client(Arc::clone(&mock));
        let txn = challenge_txn("webauthn");

        let err = client
            .verify_factor(
                txn,
                "fct1",
                VerifyFactorRequest::web_authn().signature_data("sig1"),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AuthnError::Validation(_)));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn absent_link_is_an_illegal_transition_without_transport() {
        let mock = Arc::new(MockTransport::new());
        let client = client(Arc::clone(&mock));

        // Fresh transaction has no links at all.
        let txn = AuthenticationTransaction::unauthenticated();
        let err = client.cancel(txn).await.unwrap_err();

        match err {
            AuthnError::IllegalTransition { state, action } => {
                assert_eq!(state, TransactionStatus::Unauthenticated);
                assert_eq!(action, "cancel");
            }
            other => panic!("expected IllegalTransition, got {other:?}"),
        }
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn verify_from_terminal_state_is_illegal() {
        let mock = Arc::new(MockTransport::new());
        let client = client(Arc::clone(&mock));
        let txn = AuthenticationTransaction::locked_out();

        let err = client
            .verify_factor(txn, "fct1", VerifyFactorRequest::push())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthnError::IllegalTransition { .. }));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn wrong_proof_returns_retryable_snapshot_with_links_intact() {
        let mock = Arc::new(MockTransport::new());
        mock.enqueue_status(
            403,
            json!({
                "errorCode": "E0000068",
                "errorSummary": "Invalid Passcode/Answer",
            }),
        );
        let client = client(Arc::clone(&mock));
        let txn = challenge_txn("webauthn");
        let links_before = txn.links().clone();

        let err = client
            .verify_factor(
                txn,
                "fct1",
                VerifyFactorRequest::web_authn()
                    .signature_data("bad")
                    .client_data("bad")
                    .authenticator_data("bad"),
            )
            .await
            .unwrap_err();

        match err {
            AuthnError::AuthenticationFailed {
                summary,
                transaction,
            } => {
                assert_eq!(summary, "Invalid Passcode/Answer");
                assert_eq!(transaction.status(), TransactionStatus::MfaChallenge);
                assert_eq!(*transaction.links(), links_before);
                assert!(transaction.factor("fct1").is_some());
            }
            other => panic!("expected AuthenticationFailed, got {other:?}"),
        }
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn lockout_error_body_yields_terminal_snapshot() {
        let mock = Arc::new(MockTransport::new());
        mock.enqueue_status(
            403,
            json!({
                "errorCode": "E0000069",
                "errorSummary": "User Locked",
            }),
        );
        let client = client(Arc::clone(&mock));
        let txn = challenge_txn("token:software:totp");

        let after = client
            .verify_factor(txn, "fct1", VerifyFactorRequest::otp().pass_code("000000"))
            .await
            .unwrap();
        assert_eq!(after.status(), TransactionStatus::LockedOut);
        assert!(after.is_terminal());
    }

    #[tokio::test]
    async fn unrecognizable_error_body_is_malformed() {
        let mock = Arc::new(MockTransport::new());
        mock.enqueue_status(500, json!("upstream exploded"));
        let client = client(Arc::clone(&mock));
        let txn = challenge_txn("sms");

        let err = client
            .verify_factor(txn, "fct1", VerifyFactorRequest::otp().pass_code("123456"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthnError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn verify_payload_carries_state_token_and_wire_fields() {
        let mock = Arc::new(MockTransport::new());
        mock.enqueue_ok(json!({ "status": "SUCCESS", "sessionToken": "sess" }));
        let client = client(Arc::clone(&mock));
        let txn = challenge_txn("webauthn");

        client
            .verify_factor(
                txn,
                "fct1",
                VerifyFactorRequest::web_authn()
                    .signature_data("sig1")
                    .client_data("cd1")
                    .authenticator_data("ad1"),
            )
            .await
            .unwrap();

        let calls = mock.calls();
        assert_eq!(
            calls[0].payload,
            Some(json!({
                "stateToken": "tok-challenge",
                "signatureData": "sig1",
                "clientData": "cd1",
                "authenticatorData": "ad1",
            }))
        );
        assert_eq!(
            calls[0].operation.href,
            "https://id.example.com/api/v1/authn/factors/fct1/verify"
        );
    }

    #[tokio::test]
    async fn resend_follows_factor_resend_link() {
        let mock = Arc::new(MockTransport::new());
        let body = json!({
            "stateToken": "tok",
            "status": "MFA_CHALLENGE",
            "_embedded": {
                "factor": {
                    "id": "sms1",
                    "factorType": "sms",
                    "_links": {
                        "verify": { "href": "https://id.example.com/verify" },
                        "resend": [{ "name": "sms", "href": "https://id.example.com/resend" }]
                    }
                }
            }
        });
        mock.enqueue_ok(body.clone());
        let client = client(Arc::clone(&mock));
        let txn =
            AuthenticationTransaction::from_body(&body, &FactorRegistry::new()).unwrap();

        let after = client.resend(txn, "sms1").await.unwrap();
        assert_eq!(after.status(), TransactionStatus::MfaChallenge);
        assert_eq!(mock.calls()[0].operation.href, "https://id.example.com/resend");

        // A factor without a resend link refuses without a round trip.
        let count = mock.call_count();
        let err = client.resend(challenge_txn("webauthn"), "fct1").await.unwrap_err();
        assert!(matches!(err, AuthnError::IllegalTransition { .. }));
        assert_eq!(mock.call_count(), count);
    }
}
