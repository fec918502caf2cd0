//! Transaction snapshots: status, links, and response parsing.
//!
//! Every server round-trip produces a fresh [`AuthenticationTransaction`]
//! value; snapshots are never mutated in place. The status and the link set
//! are decoded together from the same body, so they are always mutually
//! consistent.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{AuthnError, Result};
use crate::factor::{Factor, RawFactor};
use crate::registry::FactorRegistry;

/// Server-reported transaction state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionStatus {
    Unauthenticated,
    PasswordWarn,
    PasswordExpired,
    Recovery,
    RecoveryChallenge,
    PasswordReset,
    LockedOut,
    MfaEnroll,
    MfaEnrollActivate,
    MfaRequired,
    MfaChallenge,
    Success,
}

impl TransactionStatus {
    pub(crate) fn from_wire(s: &str) -> Option<Self> {
        let status = match s {
            "UNAUTHENTICATED" => Self::Unauthenticated,
            "PASSWORD_WARN" => Self::PasswordWarn,
            "PASSWORD_EXPIRED" => Self::PasswordExpired,
            "RECOVERY" => Self::Recovery,
            "RECOVERY_CHALLENGE" => Self::RecoveryChallenge,
            "PASSWORD_RESET" => Self::PasswordReset,
            "LOCKED_OUT" => Self::LockedOut,
            "MFA_ENROLL" => Self::MfaEnroll,
            "MFA_ENROLL_ACTIVATE" => Self::MfaEnrollActivate,
            "MFA_REQUIRED" => Self::MfaRequired,
            "MFA_CHALLENGE" => Self::MfaChallenge,
            "SUCCESS" => Self::Success,
            _ => return None,
        };
        Some(status)
    }

    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::PasswordWarn => "PASSWORD_WARN",
            Self::PasswordExpired => "PASSWORD_EXPIRED",
            Self::Recovery => "RECOVERY",
            Self::RecoveryChallenge => "RECOVERY_CHALLENGE",
            Self::PasswordReset => "PASSWORD_RESET",
            Self::LockedOut => "LOCKED_OUT",
            Self::MfaEnroll => "MFA_ENROLL",
            Self::MfaEnrollActivate => "MFA_ENROLL_ACTIVATE",
            Self::MfaRequired => "MFA_REQUIRED",
            Self::MfaChallenge => "MFA_CHALLENGE",
            Self::Success => "SUCCESS",
        }
    }

    /// Terminal states: the transaction cannot advance any further.
    /// `SUCCESS` yields a session token; `LOCKED_OUT` needs out-of-band
    /// unlock.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::LockedOut)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// Hints attached to a link by the server.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LinkHints {
    #[serde(default)]
    pub allow: Vec<String>,
}

/// One server-advertised next action.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Link {
    #[serde(default)]
    pub name: Option<String>,
    pub href: String,
    #[serde(default)]
    pub hints: Option<LinkHints>,
}

/// A `_links` value is usually a single object, but some relations
/// (`resend`) arrive as an array of alternatives.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
enum LinkEntry {
    Single(Link),
    Multiple(Vec<Link>),
}

/// The link set of a transaction or factor: relation name to target(s).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct Links(HashMap<String, LinkEntry>);

impl Links {
    /// First link under the given relation name, if any.
    pub fn get(&self, rel: &str) -> Option<&Link> {
        match self.0.get(rel)? {
            LinkEntry::Single(link) => Some(link),
            LinkEntry::Multiple(links) => links.first(),
        }
    }

    /// Link under `rel` whose `name` matches, for array-valued relations.
    pub fn get_named(&self, rel: &str, name: &str) -> Option<&Link> {
        match self.0.get(rel)? {
            LinkEntry::Single(link) => (link.name.as_deref() == Some(name)).then_some(link),
            LinkEntry::Multiple(links) => {
                links.iter().find(|l| l.name.as_deref() == Some(name))
            }
        }
    }

    pub fn contains(&self, rel: &str) -> bool {
        self.0.contains_key(rel)
    }

    pub fn rels(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Immutable snapshot of a server-side authentication transaction.
///
/// Flow operations on [`crate::AuthnClient`] consume the snapshot and return
/// a new one, so at most one submission can ever be in flight per
/// transaction; dropping a snapshot abandons the transaction (the server
/// expires it independently).
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticationTransaction {
    status: TransactionStatus,
    state_token: Option<String>,
    session_token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    factors: Vec<Factor>,
    links: Links,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEmbedded {
    #[serde(default)]
    factors: Vec<RawFactor>,
    /// `MFA_CHALLENGE` embeds the single factor being challenged.
    #[serde(default)]
    factor: Option<RawFactor>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTransaction {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    state_token: Option<String>,
    #[serde(default)]
    session_token: Option<String>,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
    #[serde(rename = "_embedded", default)]
    embedded: RawEmbedded,
    #[serde(rename = "_links", default)]
    links: Links,
}

impl AuthenticationTransaction {
    /// Fresh transaction before the first round trip.
    pub fn unauthenticated() -> Self {
        Self {
            status: TransactionStatus::Unauthenticated,
            state_token: None,
            session_token: None,
            expires_at: None,
            factors: Vec::new(),
            links: Links::default(),
        }
    }

    /// Terminal lockout snapshot, used when the server reports lockout as a
    /// structured error body rather than a transaction response.
    pub(crate) fn locked_out() -> Self {
        Self {
            status: TransactionStatus::LockedOut,
            state_token: None,
            session_token: None,
            expires_at: None,
            factors: Vec::new(),
            links: Links::default(),
        }
    }

    /// Decode a 2xx transaction body.
    ///
    /// `status` is always required. Non-terminal states additionally require
    /// `stateToken`; `SUCCESS` requires `sessionToken`. Unknown top-level
    /// fields are ignored; unknown factor kinds fall back to the generic
    /// variant via the registry.
    pub(crate) fn from_body(body: &Value, registry: &FactorRegistry) -> Result<Self> {
        let raw: RawTransaction = serde_json::from_value(body.clone())
            .map_err(|e| AuthnError::MalformedResponse(e.to_string()))?;

        let status_str = raw
            .status
            .ok_or_else(|| AuthnError::MalformedResponse("missing `status` field".to_string()))?;
        let status = TransactionStatus::from_wire(&status_str).ok_or_else(|| {
            AuthnError::MalformedResponse(format!("unrecognized `status` value `{status_str}`"))
        })?;

        match status {
            TransactionStatus::Success => {
                if raw.session_token.is_none() {
                    return Err(AuthnError::MalformedResponse(
                        "SUCCESS response is missing `sessionToken`".to_string(),
                    ));
                }
            }
            TransactionStatus::LockedOut => {}
            _ => {
                if raw.state_token.is_none() {
                    return Err(AuthnError::MalformedResponse(format!(
                        "{status} response is missing `stateToken`"
                    )));
                }
            }
        }

        let mut factors: Vec<Factor> = raw
            .embedded
            .factors
            .into_iter()
            .map(|f| registry.decode_factor(f))
            .collect();
        if let Some(challenged) = raw.embedded.factor {
            factors.push(registry.decode_factor(challenged));
        }

        Ok(Self {
            status,
            state_token: raw.state_token,
            session_token: raw.session_token,
            expires_at: raw.expires_at,
            factors,
            links: raw.links,
        })
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    /// Opaque token identifying the server-side transaction. Present in all
    /// non-terminal states; the only artifact worth persisting for resume.
    pub fn state_token(&self) -> Option<&str> {
        self.state_token.as_deref()
    }

    /// Session token issued on `SUCCESS`, usable with other services.
    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }

    /// Server-side expiry of the transaction, when advertised.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn factors(&self) -> &[Factor] {
        &self.factors
    }

    pub fn factor(&self, id: &str) -> Option<&Factor> {
        self.factors.iter().find(|f| f.id() == id)
    }

    pub fn links(&self) -> &Links {
        &self.links
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
