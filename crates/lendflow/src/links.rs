//! Signed action links embedded in outbound email.
//!
//! A link grants a single lender or borrower action on one loan without a
//! login. The token is an HMAC-SHA256 over a versioned, length-prefixed
//! payload, so verification is pure and stateless: no server-side record of
//! issued tokens exists, and a token minted before a request arrives can
//! still be checked against the shared secret and its embedded expiry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Default lifetime for emailed action links.
pub const DEFAULT_LINK_TTL_DAYS: i64 = 3;

const PAYLOAD_VERSION: &str = "v1";

/// Closed set of actions a signed link can authorize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkAction {
    Approve,
    Deny,
    Comment,
    Message,
    DocumentPreview,
}

impl LinkAction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Deny => "deny",
            Self::Comment => "comment",
            Self::Message => "message",
            Self::DocumentPreview => "document_preview",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "approve" => Some(Self::Approve),
            "deny" => Some(Self::Deny),
            "comment" => Some(Self::Comment),
            "message" => Some(Self::Message),
            "document_preview" => Some(Self::DocumentPreview),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LinkError {
    #[error("signature rejected")]
    SignatureMismatch,
    #[error("link expired")]
    Expired,
}

/// Token material handed to email templating.
#[derive(Debug, Clone, Serialize)]
pub struct SignedActionLink {
    pub action: LinkAction,
    pub expires_at: DateTime<Utc>,
    pub signature: String,
}

/// Stateless HMAC codec for action links.
#[derive(Clone)]
pub struct ActionLinkCodec {
    secret: Vec<u8>,
}

impl ActionLinkCodec {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn sign(&self, loan_id: &str, action: LinkAction, expires_at: DateTime<Utc>) -> String {
        let payload = encode_payload(loan_id, action, None, expires_at);
        hex::encode(hmac_sha256(&self.secret, payload.as_bytes()))
    }

    /// Document-preview variant carrying the document group and index.
    pub fn sign_document(
        &self,
        loan_id: &str,
        action: LinkAction,
        group: &str,
        index: usize,
        expires_at: DateTime<Utc>,
    ) -> String {
        let payload = encode_payload(loan_id, action, Some((group, index)), expires_at);
        hex::encode(hmac_sha256(&self.secret, payload.as_bytes()))
    }

    pub fn verify(
        &self,
        loan_id: &str,
        action: LinkAction,
        expires_at: DateTime<Utc>,
        signature: &str,
        now: DateTime<Utc>,
    ) -> Result<(), LinkError> {
        self.check(
            encode_payload(loan_id, action, None, expires_at),
            expires_at,
            signature,
            now,
        )
    }

    pub fn verify_document(
        &self,
        loan_id: &str,
        action: LinkAction,
        group: &str,
        index: usize,
        expires_at: DateTime<Utc>,
        signature: &str,
        now: DateTime<Utc>,
    ) -> Result<(), LinkError> {
        self.check(
            encode_payload(loan_id, action, Some((group, index)), expires_at),
            expires_at,
            signature,
            now,
        )
    }

    fn check(
        &self,
        payload: String,
        expires_at: DateTime<Utc>,
        signature: &str,
        now: DateTime<Utc>,
    ) -> Result<(), LinkError> {
        let expected = hmac_sha256(&self.secret, payload.as_bytes());
        let Ok(provided) = hex::decode(signature) else {
            return Err(LinkError::SignatureMismatch);
        };
        if !constant_time_eq(&expected, &provided) {
            return Err(LinkError::SignatureMismatch);
        }
        if expires_at < now {
            return Err(LinkError::Expired);
        }
        Ok(())
    }
}

/// Length-prefixed field encoding so no field value can collide with a
/// delimiter (an action or id containing ':' stays unambiguous).
fn encode_payload(
    loan_id: &str,
    action: LinkAction,
    document: Option<(&str, usize)>,
    expires_at: DateTime<Utc>,
) -> String {
    let mut payload = String::new();
    push_field(&mut payload, PAYLOAD_VERSION);
    push_field(&mut payload, loan_id);
    push_field(&mut payload, action.as_str());
    if let Some((group, index)) = document {
        push_field(&mut payload, group);
        push_field(&mut payload, &index.to_string());
    }
    push_field(&mut payload, &expires_at.timestamp().to_string());
    payload
}

fn push_field(payload: &mut String, field: &str) {
    payload.push_str(&field.len().to_string());
    payload.push(':');
    payload.push_str(field);
    payload.push(';');
}

fn hmac_sha256(secret: &[u8], message: &[u8]) -> [u8; 32] {
    const BLOCK_SIZE: usize = 64;
    let mut key_block = [0u8; BLOCK_SIZE];
    if secret.len() > BLOCK_SIZE {
        let digest = Sha256::digest(secret);
        key_block[..digest.len()].copy_from_slice(&digest);
    } else {
        key_block[..secret.len()].copy_from_slice(secret);
    }

    let mut o_key_pad = [0u8; BLOCK_SIZE];
    let mut i_key_pad = [0u8; BLOCK_SIZE];
    for i in 0..BLOCK_SIZE {
        o_key_pad[i] = key_block[i] ^ 0x5c;
        i_key_pad[i] = key_block[i] ^ 0x36;
    }

    let mut inner = Sha256::new();
    inner.update(i_key_pad);
    inner.update(message);
    let inner_hash = inner.finalize();

    let mut outer = Sha256::new();
    outer.update(o_key_pad);
    outer.update(inner_hash);
    outer.finalize().into()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (&x, &y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn codec() -> ActionLinkCodec {
        ActionLinkCodec::new(b"unit-test-secret".to_vec())
    }

    fn expiry() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 9, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn round_trip_verifies() {
        let codec = codec();
        let exp = expiry();
        let sig = codec.sign("loan-000001", LinkAction::Approve, exp);
        let now = exp - chrono::Duration::days(1);
        assert_eq!(
            codec.verify("loan-000001", LinkAction::Approve, exp, &sig, now),
            Ok(())
        );
    }

    #[test]
    fn any_mutated_field_fails() {
        let codec = codec();
        let exp = expiry();
        let now = exp - chrono::Duration::days(1);
        let sig = codec.sign("loan-000001", LinkAction::Approve, exp);

        assert_eq!(
            codec.verify("loan-000002", LinkAction::Approve, exp, &sig, now),
            Err(LinkError::SignatureMismatch)
        );
        assert_eq!(
            codec.verify("loan-000001", LinkAction::Deny, exp, &sig, now),
            Err(LinkError::SignatureMismatch)
        );
        assert_eq!(
            codec.verify(
                "loan-000001",
                LinkAction::Approve,
                exp + chrono::Duration::seconds(1),
                &sig,
                now
            ),
            Err(LinkError::SignatureMismatch)
        );

        let mut tampered = sig.into_bytes();
        tampered[0] = if tampered[0] == b'0' { b'1' } else { b'0' };
        let tampered = String::from_utf8(tampered).expect("hex stays utf8");
        assert_eq!(
            codec.verify("loan-000001", LinkAction::Approve, exp, &tampered, now),
            Err(LinkError::SignatureMismatch)
        );
    }

    #[test]
    fn correct_signature_after_expiry_fails() {
        let codec = codec();
        let exp = expiry();
        let sig = codec.sign("loan-000001", LinkAction::Approve, exp);
        let now = exp + chrono::Duration::seconds(1);
        assert_eq!(
            codec.verify("loan-000001", LinkAction::Approve, exp, &sig, now),
            Err(LinkError::Expired)
        );
    }

    #[test]
    fn document_variant_binds_group_and_index() {
        let codec = codec();
        let exp = expiry();
        let now = exp - chrono::Duration::hours(1);
        let sig = codec.sign_document("loan-000001", LinkAction::DocumentPreview, "comps", 2, exp);

        assert_eq!(
            codec.verify_document(
                "loan-000001",
                LinkAction::DocumentPreview,
                "comps",
                2,
                exp,
                &sig,
                now
            ),
            Ok(())
        );
        assert_eq!(
            codec.verify_document(
                "loan-000001",
                LinkAction::DocumentPreview,
                "photos",
                2,
                exp,
                &sig,
                now
            ),
            Err(LinkError::SignatureMismatch)
        );
        assert_eq!(
            codec.verify_document(
                "loan-000001",
                LinkAction::DocumentPreview,
                "comps",
                3,
                exp,
                &sig,
                now
            ),
            Err(LinkError::SignatureMismatch)
        );
    }

    #[test]
    fn field_boundaries_cannot_be_shifted() {
        // "ab" + "c" and "a" + "bc" must not produce the same payload.
        let codec = codec();
        let exp = expiry();
        let now = exp - chrono::Duration::hours(1);
        let sig = codec.sign_document("loan-1", LinkAction::DocumentPreview, "ab1", 2, exp);
        assert_eq!(
            codec.verify_document("loan-1", LinkAction::DocumentPreview, "ab", 12, exp, &sig, now),
            Err(LinkError::SignatureMismatch)
        );
    }
}
