//! Factor registry: maps a wire discriminator to the request variant a
//! factor accepts and to its profile decoder.
//!
//! A lookup miss is never a hard failure. Unrecognized discriminators decode
//! into [`FactorKind::Unknown`] with the raw profile preserved, and only the
//! generic verify request is accepted against them.

use std::collections::HashMap;

use serde_json::Value;

use crate::factor::{Factor, FactorKind, FactorProfile, RawFactor};
use crate::request::{RequestKind, VerifyFactorRequest};

type ProfileDecoder = fn(&Value) -> FactorProfile;

/// Registry entry for one known factor kind.
pub struct FactorEntry {
    kind: FactorKind,
    accepts: &'static [RequestKind],
    decode: ProfileDecoder,
}

impl FactorEntry {
    pub fn kind(&self) -> &FactorKind {
        &self.kind
    }

    /// Request variants that may legally verify this factor kind.
    pub fn accepts(&self) -> &[RequestKind] {
        self.accepts
    }
}

pub struct FactorRegistry {
    entries: HashMap<&'static str, FactorEntry>,
}

impl FactorRegistry {
    /// Registry pre-populated with the factor kinds this crate knows.
    pub fn new() -> Self {
        const BUILTIN: &[(
            &str,
            FactorKind,
            &[RequestKind],
            ProfileDecoder,
        )] = &[
            ("password", FactorKind::Password, &[RequestKind::Password], FactorProfile::decode_raw),
            ("sms", FactorKind::Sms, &[RequestKind::Otp], FactorProfile::decode_phone),
            ("call", FactorKind::Call, &[RequestKind::Otp], FactorProfile::decode_phone),
            ("email", FactorKind::Email, &[RequestKind::Otp], FactorProfile::decode_email),
            ("token:software:totp", FactorKind::TotpSoftware, &[RequestKind::Otp], FactorProfile::decode_token),
            ("token:hardware", FactorKind::TokenHardware, &[RequestKind::Otp], FactorProfile::decode_token),
            ("push", FactorKind::Push, &[RequestKind::Push], FactorProfile::decode_push),
            ("question", FactorKind::Question, &[RequestKind::Question], FactorProfile::decode_question),
            ("u2f", FactorKind::U2f, &[RequestKind::U2f], FactorProfile::decode_security_key),
            ("webauthn", FactorKind::WebAuthn, &[RequestKind::WebAuthn], FactorProfile::decode_security_key),
        ];

        let entries = BUILTIN
            .iter()
            .map(|(discriminator, kind, accepts, decode)| {
                (
                    *discriminator,
                    FactorEntry {
                        kind: kind.clone(),
                        accepts: *accepts,
                        decode: *decode,
                    },
                )
            })
            .collect();

        Self { entries }
    }

    pub fn lookup(&self, discriminator: &str) -> Option<&FactorEntry> {
        self.entries.get(discriminator)
    }

    /// Decode an embedded factor, falling back to the generic shape for
    /// discriminators the registry has no entry for.
    pub(crate) fn decode_factor(&self, raw: RawFactor) -> Factor {
        match self.lookup(&raw.factor_type) {
            Some(entry) => Factor::new(
                raw.id,
                entry.kind.clone(),
                raw.provider,
                raw.vendor_name,
                (entry.decode)(&raw.profile),
                raw.links,
            ),
            None => Factor::new(
                raw.id,
                FactorKind::Unknown(raw.factor_type),
                raw.provider,
                raw.vendor_name,
                FactorProfile::decode_raw(&raw.profile),
                raw.links,
            ),
        }
    }

    /// Whether `request` structurally matches the factor kind being verified.
    /// Unknown kinds accept only the generic request.
    pub fn request_matches(&self, kind: &FactorKind, request: &VerifyFactorRequest) -> bool {
        match self.lookup(kind.as_discriminator()) {
            Some(entry) => entry.accepts.contains(&request.kind()),
            None => request.kind() == RequestKind::Generic,
        }
    }
}

impl Default for FactorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_kinds_resolve() {
        let registry = FactorRegistry::new();
        let entry = registry.lookup("token:software:totp").unwrap();
        assert_eq!(*entry.kind(), FactorKind::TotpSoftware);
        assert_eq!(entry.accepts(), &[RequestKind::Otp][..]);
    }

    #[test]
    fn lookup_miss_is_none_not_panic() {
        let registry = FactorRegistry::new();
        assert!(registry.lookup("hologram").is_none());
    }

    #[test]
    fn otp_request_matches_every_otp_factor() {
        let registry = FactorRegistry::new();
        let otp: VerifyFactorRequest = VerifyFactorRequest::otp().pass_code("123456").into();
        for kind in [
            FactorKind::Sms,
            FactorKind::Call,
            FactorKind::Email,
            FactorKind::TotpSoftware,
            FactorKind::TokenHardware,
        ] {
            assert!(registry.request_matches(&kind, &otp), "{kind} should take otp");
        }
        assert!(!registry.request_matches(&FactorKind::WebAuthn, &otp));
        assert!(!registry.request_matches(&FactorKind::Push, &otp));
    }

    #[test]
    fn u2f_and_webauthn_are_disjoint() {
        let registry = FactorRegistry::new();
        let u2f: VerifyFactorRequest = VerifyFactorRequest::u2f().into();
        let webauthn: VerifyFactorRequest = VerifyFactorRequest::web_authn().into();

        assert!(registry.request_matches(&FactorKind::U2f, &u2f));
        assert!(!registry.request_matches(&FactorKind::U2f, &webauthn));
        assert!(registry.request_matches(&FactorKind::WebAuthn, &webauthn));
        assert!(!registry.request_matches(&FactorKind::WebAuthn, &u2f));
    }

    #[test]
    fn unknown_kind_accepts_only_generic() {
        let registry = FactorRegistry::new();
        let kind = FactorKind::Unknown("token:quantum:entangled".to_string());

        let generic: VerifyFactorRequest = VerifyFactorRequest::generic().into();
        let otp: VerifyFactorRequest = VerifyFactorRequest::otp().into();

        assert!(registry.request_matches(&kind, &generic));
        assert!(!registry.request_matches(&kind, &otp));
    }
}
