//! Typed verification payload builders, one variant per factor shape.
//!
//! Each variant is a small chaining builder (`VerifyFactorRequest::otp()
//! .pass_code("123456")`). Setters are last-write-wins and never validate;
//! required-field checks happen lazily when the request is serialized for
//! submission, mirroring the server's own lazy validation.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{AuthnError, Result};

/// Discriminant of a verify request variant, used by the factor registry to
/// check that a request structurally matches the factor it targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Password,
    Otp,
    Push,
    Question,
    U2f,
    WebAuthn,
    Generic,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Password => "password",
            Self::Otp => "otp",
            Self::Push => "push",
            Self::Question => "question",
            Self::U2f => "u2f",
            Self::WebAuthn => "webauthn",
            Self::Generic => "generic",
        };
        f.write_str(name)
    }
}

/// A factor verification payload, consumed exactly once per submission.
#[derive(Debug, Clone, PartialEq)]
pub enum VerifyFactorRequest {
    Password(PasswordVerify),
    Otp(OtpVerify),
    Push(PushVerify),
    Question(QuestionVerify),
    U2f(U2fVerify),
    WebAuthn(WebAuthnVerify),
    Generic(GenericVerify),
}

impl VerifyFactorRequest {
    pub fn password() -> PasswordVerify {
        PasswordVerify::default()
    }

    /// OTP proof for SMS, call, email, and TOTP/hardware-token factors.
    pub fn otp() -> OtpVerify {
        OtpVerify::default()
    }

    pub fn push() -> PushVerify {
        PushVerify::default()
    }

    pub fn question() -> QuestionVerify {
        QuestionVerify::default()
    }

    pub fn u2f() -> U2fVerify {
        U2fVerify::default()
    }

    pub fn web_authn() -> WebAuthnVerify {
        WebAuthnVerify::default()
    }

    /// Escape hatch for factor kinds this crate does not recognize.
    pub fn generic() -> GenericVerify {
        GenericVerify::default()
    }

    pub fn kind(&self) -> RequestKind {
        match self {
            Self::Password(_) => RequestKind::Password,
            Self::Otp(_) => RequestKind::Otp,
            Self::Push(_) => RequestKind::Push,
            Self::Question(_) => RequestKind::Question,
            Self::U2f(_) => RequestKind::U2f,
            Self::WebAuthn(_) => RequestKind::WebAuthn,
            Self::Generic(_) => RequestKind::Generic,
        }
    }

    /// Serialize the variant's fields under their exact wire names.
    ///
    /// This is where lazy validation happens: a missing required field fails
    /// with [`AuthnError::Validation`] naming the field, before anything
    /// reaches the transport.
    pub(crate) fn wire_fields(&self) -> Result<Map<String, Value>> {
        match self {
            Self::Password(r) => {
                let password = require(r.password.as_deref(), "password", self.kind())?;
                to_fields(&PasswordFields { password })
            }
            Self::Otp(r) => {
                let pass_code = require(r.pass_code.as_deref(), "passCode", self.kind())?;
                to_fields(&OtpFields { pass_code })
            }
            Self::Push(_) => Ok(Map::new()),
            Self::Question(r) => {
                let answer = require(r.answer.as_deref(), "answer", self.kind())?;
                to_fields(&QuestionFields { answer })
            }
            Self::U2f(r) => {
                let signature_data =
                    require(r.signature_data.as_deref(), "signatureData", self.kind())?;
                let client_data = require(r.client_data.as_deref(), "clientData", self.kind())?;
                to_fields(&U2fFields {
                    signature_data,
                    client_data,
                })
            }
            Self::WebAuthn(r) => {
                let signature_data =
                    require(r.signature_data.as_deref(), "signatureData", self.kind())?;
                let client_data = require(r.client_data.as_deref(), "clientData", self.kind())?;
                let authenticator_data = require(
                    r.authenticator_data.as_deref(),
                    "authenticatorData",
                    self.kind(),
                )?;
                to_fields(&WebAuthnFields {
                    signature_data,
                    client_data,
                    authenticator_data,
                })
            }
            Self::Generic(r) => Ok(r.fields.clone()),
        }
    }
}

fn require<'a>(field: Option<&'a str>, name: &str, kind: RequestKind) -> Result<&'a str> {
    field.ok_or_else(|| {
        AuthnError::Validation(format!("`{name}` is required to verify a {kind} factor"))
    })
}

fn to_fields<T: Serialize>(fields: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(fields) {
        Ok(Value::Object(map)) => Ok(map),
        // Unreachable for the structs below; kept as a guard for new variants.
        _ => Err(AuthnError::Validation(
            "verify request did not serialize to an object".to_string(),
        )),
    }
}

// Wire shapes. Field names here are server API contract; do not rename.

#[derive(Serialize)]
struct PasswordFields<'a> {
    password: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OtpFields<'a> {
    pass_code: &'a str,
}

#[derive(Serialize)]
struct QuestionFields<'a> {
    answer: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct U2fFields<'a> {
    signature_data: &'a str,
    client_data: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WebAuthnFields<'a> {
    signature_data: &'a str,
    client_data: &'a str,
    authenticator_data: &'a str,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PasswordVerify {
    password: Option<String>,
}

impl PasswordVerify {
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OtpVerify {
    pass_code: Option<String>,
}

impl OtpVerify {
    pub fn pass_code(mut self, pass_code: impl Into<String>) -> Self {
        self.pass_code = Some(pass_code.into());
        self
    }
}

/// Push verification carries no proof fields; submitting it polls the
/// out-of-band approval.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PushVerify;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuestionVerify {
    answer: Option<String>,
}

impl QuestionVerify {
    pub fn answer(mut self, answer: impl Into<String>) -> Self {
        self.answer = Some(answer.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct U2fVerify {
    signature_data: Option<String>,
    client_data: Option<String>,
}

impl U2fVerify {
    pub fn signature_data(mut self, signature_data: impl Into<String>) -> Self {
        self.signature_data = Some(signature_data.into());
        self
    }

    pub fn client_data(mut self, client_data: impl Into<String>) -> Self {
        self.client_data = Some(client_data.into());
        self
    }
}

/// WebAuthn assertion proof.
///
/// Deliberately a full, disjoint variant rather than an extension of
/// [`U2fVerify`]: the two protocols share field names but not payload
/// semantics, so nothing is inherited.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WebAuthnVerify {
    signature_data: Option<String>,
    client_data: Option<String>,
    authenticator_data: Option<String>,
}

impl WebAuthnVerify {
    pub fn signature_data(mut self, signature_data: impl Into<String>) -> Self {
        self.signature_data = Some(signature_data.into());
        self
    }

    pub fn client_data(mut self, client_data: impl Into<String>) -> Self {
        self.client_data = Some(client_data.into());
        self
    }

    pub fn authenticator_data(mut self, authenticator_data: impl Into<String>) -> Self {
        self.authenticator_data = Some(authenticator_data.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenericVerify {
    fields: Map<String, Value>,
}

impl GenericVerify {
    /// Set an arbitrary wire field. Last write wins.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }
}

macro_rules! impl_into_request {
    ($($builder:ident => $variant:ident),+ $(,)?) => {
        $(impl From<$builder> for VerifyFactorRequest {
            fn from(builder: $builder) -> Self {
                VerifyFactorRequest::$variant(builder)
            }
        })+
    };
}

impl_into_request!(
    PasswordVerify => Password,
    OtpVerify => Otp,
    PushVerify => Push,
    QuestionVerify => Question,
    U2fVerify => U2f,
    WebAuthnVerify => WebAuthn,
    GenericVerify => Generic,
);
