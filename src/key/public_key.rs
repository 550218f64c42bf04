//! Enrolled public keys.

use std::fmt;

use base64ct::{Base64, Encoding};
use chrono::{DateTime, Utc};
use rsa::RsaPublicKey;
use rsa::pkcs1::{DecodeRsaPublicKey, EncodeRsaPublicKey, LineEnding};
use rsa::pkcs8::DecodePublicKey;
use serde::{Deserialize, Serialize};

use crate::crypto::{RANDOM_ID_LENGTH, random_string};
use crate::error::{IdentityError, Result};
use crate::key::fingerprint::Fingerprints;
use crate::key::ssh::SshPublicKey;
use crate::request::{KeyRequest, KeySpec};

const RSA_PEM_LABEL: &str = "RSA PUBLIC KEY";
const OPENSSH_PREFIXES: [&str; 3] = ["ssh-", "ecdsa-", "sk-"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyUsage {
    Ssh,
    Gpg,
}

impl KeyUsage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ssh => "ssh",
            Self::Gpg => "gpg",
        }
    }
}

impl fmt::Display for KeyUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Public key attached to a user.
///
/// Type, payload and fingerprints always come from the same parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
    id: String,
    usage: KeyUsage,
    #[serde(rename = "type")]
    key_type: String,
    fingerprint: String,
    fingerprint_md5: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    comment: String,
    /// Canonical form: PKCS#1 PEM for RSA, authorized key line otherwise.
    payload: String,
    /// `<type> <base64>` authorized key line, without comment.
    openssh: String,
    created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    expired: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expired_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    disabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    disabled_at: Option<DateTime<Utc>>,
}

/// Key decoded from a payload plus the comment found next to it.
struct Parsed {
    key: SshPublicKey,
    comment: Option<String>,
}

fn parse_pem(payload: &str) -> Result<Parsed> {
    let (label, der) = der::pem::decode_vec(payload.as_bytes()).map_err(|err| {
        IdentityError::invalid("payload", "pem", format!("malformed PEM block: {err}"))
    })?;
    if label != RSA_PEM_LABEL {
        return Err(IdentityError::invalid(
            "payload",
            label,
            "expected an RSA PUBLIC KEY block",
        ));
    }

    // Some tools write SubjectPublicKeyInfo under the PKCS#1 label.
    let key = RsaPublicKey::from_pkcs1_der(&der)
        .ok()
        .or_else(|| RsaPublicKey::from_public_key_der(&der).ok())
        .ok_or_else(|| {
            IdentityError::invalid("payload", "pem", "malformed RSA public key")
        })?;

    Ok(Parsed {
        key: key.into(),
        comment: None,
    })
}

fn parse_openssh(payload: &str) -> Result<Parsed> {
    let mut parts = payload.split_whitespace();
    let declared = parts.next().unwrap_or_default();
    let encoded = parts
        .next()
        .ok_or_else(|| IdentityError::invalid("payload", declared, "missing key data"))?;
    let comment = parts.collect::<Vec<_>>().join(" ");

    let blob = Base64::decode_vec(encoded).map_err(|_| {
        IdentityError::invalid("payload", declared, "malformed base64 key data")
    })?;
    let key = SshPublicKey::from_wire(&blob)?;
    if key.key_type() != declared {
        return Err(IdentityError::invalid(
            "payload",
            declared,
            format!("key data is {}", key.key_type()),
        ));
    }

    Ok(Parsed {
        key,
        comment: (!comment.is_empty()).then_some(comment),
    })
}

impl PublicKey {
    /// Parse a key request.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Unsupported`] for gpg keys, unknown key
    /// types and unknown payload shapes. Returns a validation error for
    /// malformed payloads.
    pub fn parse(request: &KeyRequest, now: DateTime<Utc>) -> Result<Self> {
        let spec = match request {
            KeyRequest::Ssh(spec) => spec,
            KeyRequest::Gpg(_) => {
                return Err(IdentityError::unsupported("key usage", KeyUsage::Gpg));
            }
        };
        Self::parse_ssh(spec, now)
    }

    fn parse_ssh(spec: &KeySpec, now: DateTime<Utc>) -> Result<Self> {
        let payload = spec.payload.trim();
        if payload.is_empty() {
            return Err(IdentityError::invalid("payload", "", "empty payload"));
        }

        let parsed = if payload.contains(RSA_PEM_LABEL) {
            parse_pem(payload)?
        } else if OPENSSH_PREFIXES.iter().any(|p| payload.starts_with(p)) {
            parse_openssh(payload)?
        } else {
            return Err(IdentityError::unsupported("key format", "unrecognized payload"));
        };

        let key = &parsed.key;
        let fingerprints = Fingerprints::of(key);
        let openssh = format!(
            "{} {}",
            key.key_type(),
            Base64::encode_string(&key.to_wire())
        );
        let canonical = match key {
            SshPublicKey::Rsa(rsa) => rsa
                .to_pkcs1_pem(LineEnding::LF)
                .map_err(|err| IdentityError::Crypto {
                    cause: err.to_string(),
                })?,
            _ => openssh.clone(),
        };

        let comment = match spec.comment.trim() {
            "" => parsed.comment.unwrap_or_default(),
            given => given.to_owned(),
        };

        let mut public_key = Self {
            id: random_string(RANDOM_ID_LENGTH),
            usage: KeyUsage::Ssh,
            key_type: key.key_type().to_owned(),
            fingerprint: fingerprints.sha256,
            fingerprint_md5: fingerprints.md5,
            comment,
            payload: canonical,
            openssh,
            created_at: now,
            expired: false,
            expired_at: None,
            disabled: false,
            disabled_at: None,
        };
        if spec.disabled {
            public_key.disable(now);
        }

        Ok(public_key)
    }

    pub fn disable(&mut self, now: DateTime<Utc>) {
        if !self.disabled {
            self.expired = true;
            self.expired_at = Some(now);
            self.disabled = true;
            self.disabled_at = Some(now);
        }
    }

    #[inline]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    pub fn usage(&self) -> KeyUsage {
        self.usage
    }

    #[inline]
    pub fn key_type(&self) -> &str {
        &self.key_type
    }

    /// SHA-256 fingerprint, unpadded base64.
    #[inline]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    #[inline]
    pub fn fingerprint_md5(&self) -> &str {
        &self.fingerprint_md5
    }

    #[inline]
    pub fn comment(&self) -> &str {
        &self.comment
    }

    #[inline]
    pub fn payload(&self) -> &str {
        &self.payload
    }

    #[inline]
    pub fn openssh(&self) -> &str {
        &self.openssh
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::key::tests::*;

    fn ssh(payload: &str) -> KeyRequest {
        KeyRequest::Ssh(KeySpec::new(payload))
    }

    #[test]
    fn test_openssh_rsa() {
        let key = PublicKey::parse(&ssh(RSA_LINE), Utc::now()).unwrap();

        assert_eq!(key.key_type(), "ssh-rsa");
        assert_eq!(key.usage(), KeyUsage::Ssh);
        assert_eq!(key.fingerprint(), RSA_SHA256);
        assert_eq!(key.fingerprint_md5(), RSA_MD5);
        assert_eq!(key.comment(), "jsmith@example.com");
        assert_eq!(key.payload().trim(), RSA_PKCS1_PEM.trim());
        assert!(RSA_LINE.starts_with(key.openssh()));
        assert_eq!(key.id().len(), RANDOM_ID_LENGTH);
        assert!(!key.is_disabled());
    }

    #[test]
    fn test_pem_matches_openssh() {
        let from_line = PublicKey::parse(&ssh(RSA_LINE), Utc::now()).unwrap();

        for pem in [RSA_PKCS1_PEM, RSA_SPKI_PEM] {
            let from_pem = PublicKey::parse(&ssh(pem), Utc::now()).unwrap();
            assert_eq!(from_pem.fingerprint(), from_line.fingerprint());
            assert_eq!(from_pem.fingerprint_md5(), from_line.fingerprint_md5());
            assert_eq!(from_pem.openssh(), from_line.openssh());
            assert_eq!(from_pem.payload(), from_line.payload());
            assert_eq!(from_pem.comment(), "");
        }
    }

    #[test]
    fn test_other_types_not_converted() {
        let key = PublicKey::parse(&ssh(ED25519_LINE), Utc::now()).unwrap();
        assert_eq!(key.key_type(), "ssh-ed25519");
        assert_eq!(key.fingerprint(), ED25519_SHA256);
        assert_eq!(key.payload(), key.openssh());
        assert_eq!(key.comment(), "laptop");

        let key = PublicKey::parse(&ssh(ECDSA_LINE), Utc::now()).unwrap();
        assert_eq!(key.key_type(), "ecdsa-sha2-nistp256");
        assert_eq!(key.fingerprint_md5(), ECDSA_MD5);
    }

    #[test]
    fn test_request_comment_wins() {
        let request = KeyRequest::Ssh(KeySpec::new(RSA_LINE).comment("work laptop"));
        let key = PublicKey::parse(&request, Utc::now()).unwrap();
        assert_eq!(key.comment(), "work laptop");
    }

    #[test]
    fn test_disabled_on_creation() {
        let mut spec = KeySpec::new(ED25519_LINE);
        spec.disabled = true;
        let key = PublicKey::parse(&KeyRequest::Ssh(spec), Utc::now()).unwrap();
        assert!(key.is_disabled());
    }

    #[test]
    fn test_unsupported() {
        let gpg = KeyRequest::Gpg(KeySpec::new(RSA_LINE));
        let err = PublicKey::parse(&gpg, Utc::now()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);

        let pkcs8 = "-----BEGIN PUBLIC KEY-----\nMFkw\n-----END PUBLIC KEY-----";
        let err = PublicKey::parse(&ssh(pkcs8), Utc::now()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }

    #[test]
    fn test_malformed() {
        for payload in [
            "",
            "ssh-rsa",
            "ssh-rsa !!!notbase64 comment",
            "ssh-ed25519 AAAAB3NzaC1yc2EAAAADAQABAAABAQCZ",
            "-----BEGIN RSA PUBLIC KEY-----\nAAAA\n-----END RSA PUBLIC KEY-----",
        ] {
            let err = PublicKey::parse(&ssh(payload), Utc::now()).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation, "{payload:?}");
        }
    }

    #[test]
    fn test_mismatched_declared_type() {
        let blob = ED25519_LINE.split_whitespace().nth(1).unwrap();
        let payload = format!("ssh-rsa {blob}");
        let err = PublicKey::parse(&ssh(&payload), Utc::now()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
