//! Factor descriptors embedded in server transaction responses.
//!
//! A [`Factor`] describes one enrolled verification method (SMS, TOTP, push,
//! security key, ...). Factor kinds are open-ended on the wire: a server may
//! advertise discriminators this crate has never heard of, so [`FactorKind`]
//! carries an `Unknown` variant and profile decoding always has a raw
//! fallback instead of a hard failure.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::transaction::Links;

/// Factor-type discriminator, preserving the exact wire string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FactorKind {
    Password,
    Sms,
    Call,
    Email,
    /// Software TOTP authenticator (`token:software:totp`).
    TotpSoftware,
    /// Hardware OTP token (`token:hardware`).
    TokenHardware,
    Push,
    Question,
    U2f,
    WebAuthn,
    /// A discriminator this crate does not recognize. Kept verbatim for
    /// forward compatibility with factor kinds introduced server-side.
    Unknown(String),
}

impl FactorKind {
    pub fn from_discriminator(s: &str) -> Self {
        match s {
            "password" => Self::Password,
            "sms" => Self::Sms,
            "call" => Self::Call,
            "email" => Self::Email,
            "token:software:totp" => Self::TotpSoftware,
            "token:hardware" => Self::TokenHardware,
            "push" => Self::Push,
            "question" => Self::Question,
            "u2f" => Self::U2f,
            "webauthn" => Self::WebAuthn,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// The exact string the server uses for this kind.
    pub fn as_discriminator(&self) -> &str {
        match self {
            Self::Password => "password",
            Self::Sms => "sms",
            Self::Call => "call",
            Self::Email => "email",
            Self::TotpSoftware => "token:software:totp",
            Self::TokenHardware => "token:hardware",
            Self::Push => "push",
            Self::Question => "question",
            Self::U2f => "u2f",
            Self::WebAuthn => "webauthn",
            Self::Unknown(other) => other,
        }
    }

    /// Whether this kind was recognized by the client.
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl fmt::Display for FactorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_discriminator())
    }
}

impl Serialize for FactorKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_discriminator())
    }
}

impl<'de> Deserialize<'de> for FactorKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from_discriminator(&s))
    }
}

/// Factor-specific profile data, decoded per kind.
///
/// Decoding never fails hard: a profile that does not fit the expected shape
/// is kept as [`FactorProfile::Raw`].
#[derive(Debug, Clone, PartialEq)]
pub enum FactorProfile {
    /// SMS and voice-call factors.
    Phone {
        phone_number: Option<String>,
        phone_extension: Option<String>,
    },
    Email {
        email: Option<String>,
    },
    /// Software and hardware OTP tokens.
    Token {
        credential_id: Option<String>,
    },
    Push {
        credential_id: Option<String>,
        device_type: Option<String>,
        name: Option<String>,
        platform: Option<String>,
        version: Option<String>,
    },
    Question {
        question: Option<String>,
        question_text: Option<String>,
    },
    /// U2F and WebAuthn security keys.
    SecurityKey {
        credential_id: Option<String>,
        authenticator_name: Option<String>,
    },
    /// No profile data was present.
    Empty,
    /// Unrecognized or undecodable profile, kept verbatim.
    Raw(Value),
}

macro_rules! profile_decoder {
    ($fn_name:ident, $raw:ident { $($field:ident),+ $(,)? } => $variant:ident) => {
        pub(crate) fn $fn_name(value: &Value) -> FactorProfile {
            #[derive(Deserialize)]
            #[serde(rename_all = "camelCase")]
            struct $raw {
                $(#[serde(default)] $field: Option<String>,)+
            }

            if value.is_null() {
                return FactorProfile::Empty;
            }
            match serde_json::from_value::<$raw>(value.clone()) {
                Ok(p) => FactorProfile::$variant { $($field: p.$field),+ },
                Err(_) => FactorProfile::Raw(value.clone()),
            }
        }
    };
}

impl FactorProfile {
    profile_decoder!(decode_phone, RawPhone { phone_number, phone_extension } => Phone);
    profile_decoder!(decode_email, RawEmail { email } => Email);
    profile_decoder!(decode_token, RawToken { credential_id } => Token);
    profile_decoder!(decode_push, RawPush { credential_id, device_type, name, platform, version } => Push);
    profile_decoder!(decode_question, RawQuestion { question, question_text } => Question);
    profile_decoder!(decode_security_key, RawKey { credential_id, authenticator_name } => SecurityKey);

    pub(crate) fn decode_raw(value: &Value) -> FactorProfile {
        if value.is_null() {
            FactorProfile::Empty
        } else {
            FactorProfile::Raw(value.clone())
        }
    }
}

/// One enrolled factor as advertised by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct Factor {
    id: String,
    kind: FactorKind,
    provider: Option<String>,
    vendor_name: Option<String>,
    profile: FactorProfile,
    links: Links,
}

impl Factor {
    pub(crate) fn new(
        id: String,
        kind: FactorKind,
        provider: Option<String>,
        vendor_name: Option<String>,
        profile: FactorProfile,
        links: Links,
    ) -> Self {
        Self {
            id,
            kind,
            provider,
            vendor_name,
            profile,
            links,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> &FactorKind {
        &self.kind
    }

    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    pub fn vendor_name(&self) -> Option<&str> {
        self.vendor_name.as_deref()
    }

    pub fn profile(&self) -> &FactorProfile {
        &self.profile
    }

    /// Links the server advertises for this factor (`verify`, `resend`, ...).
    pub fn links(&self) -> &Links {
        &self.links
    }
}

/// Wire shape of an embedded factor, before registry-driven decoding.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawFactor {
    pub(crate) id: String,
    pub(crate) factor_type: String,
    #[serde(default)]
    pub(crate) provider: Option<String>,
    #[serde(default)]
    pub(crate) vendor_name: Option<String>,
    #[serde(default)]
    pub(crate) profile: Value,
    #[serde(rename = "_links", default)]
    pub(crate) links: Links,
}
