//! Example walking a full MFA flow against a scripted transport.
//!
//! Run with: cargo run -p authn-core --example mfa_flow

use std::sync::Arc;

use serde_json::json;
use tracing_subscriber::{fmt, EnvFilter};

use authn_core::{AuthnClient, MockTransport, TransactionStatus, VerifyFactorRequest};

#[tokio::main]
async fn main() {
    // Initialize tracing subscriber with debug level
    fmt()
        .with_env_filter(EnvFilter::new("authn_core=debug,info"))
        .with_target(true)
        .init();

    println!("=== MFA Flow Demo (scripted transport) ===\n");

    let mock = Arc::new(MockTransport::new());
    mock.enqueue_ok(json!({
        "stateToken": "00demoStateToken",
        "status": "MFA_REQUIRED",
        "_embedded": {
            "factors": [{
                "id": "ostf1fmtMGJLMNGNLIVG",
                "factorType": "token:software:totp",
                "provider": "EXAMPLE",
                "profile": { "credentialId": "jdoe@example.com" },
                "_links": {
                    "verify": { "href": "https://id.example.com/api/v1/authn/factors/ostf1fmtMGJLMNGNLIVG/verify" }
                }
            }]
        },
        "_links": {
            "cancel": { "href": "https://id.example.com/api/v1/authn/cancel" }
        }
    }));
    mock.enqueue_ok(json!({
        "status": "SUCCESS",
        "sessionToken": "20demoSessionToken"
    }));

    let client = AuthnClient::new("https://id.example.com", mock);

    let txn = match client.authenticate("jdoe", "hunter2").await {
        Ok(txn) => txn,
        Err(e) => {
            eprintln!("authenticate failed: {e}");
            return;
        }
    };
    println!("State: {}", txn.status());
    for factor in txn.factors() {
        println!("  factor {} ({})", factor.id(), factor.kind());
    }

    if txn.status() != TransactionStatus::MfaRequired {
        return;
    }

    let factor_id = txn.factors()[0].id().to_string();
    match client
        .verify_factor(
            txn,
            &factor_id,
            VerifyFactorRequest::otp().pass_code("123456"),
        )
        .await
    {
        Ok(txn) => {
            println!("State: {}", txn.status());
            if let Some(session) = txn.session_token() {
                println!("Session token: {session}");
            }
        }
        Err(e) => println!("verification failed: {e}"),
    }
}
