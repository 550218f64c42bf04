//! OpenSSH public key wire format (RFC 4253 section 6.6, RFC 5656).

use p256::elliptic_curve::sec1::FromEncodedPoint;
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPublicKey};

use crate::error::{IdentityError, Result};

pub const SSH_RSA: &str = "ssh-rsa";
pub const SSH_ED25519: &str = "ssh-ed25519";
pub const ECDSA_NISTP256: &str = "ecdsa-sha2-nistp256";
pub const ECDSA_NISTP384: &str = "ecdsa-sha2-nistp384";
pub const ECDSA_NISTP521: &str = "ecdsa-sha2-nistp521";

const ED25519_KEY_LENGTH: usize = 32;
const RSA_MAX_BITS: usize = 16384;

fn malformed(reason: &str) -> IdentityError {
    IdentityError::invalid("payload", "ssh public key", reason)
}

/// Cursor over a wire-encoded blob.
struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn read_u32(&mut self) -> Result<u32> {
        let (head, rest) = self
            .buf
            .split_first_chunk::<4>()
            .ok_or_else(|| malformed("truncated length"))?;
        self.buf = rest;
        Ok(u32::from_be_bytes(*head))
    }

    fn read_string(&mut self) -> Result<&'a [u8]> {
        let len = self.read_u32()? as usize;
        if self.buf.len() < len {
            return Err(malformed("truncated field"));
        }
        let (value, rest) = self.buf.split_at(len);
        self.buf = rest;
        Ok(value)
    }

    fn read_str(&mut self) -> Result<&'a str> {
        std::str::from_utf8(self.read_string()?)
            .map_err(|_| malformed("field is not utf-8"))
    }

    /// Positive multiple precision integer.
    fn read_mpint(&mut self) -> Result<BigUint> {
        let bytes = self.read_string()?;
        if bytes.first().is_some_and(|b| b & 0x80 != 0) {
            return Err(malformed("negative integer"));
        }
        Ok(BigUint::from_bytes_be(bytes))
    }

    fn finish(self) -> Result<()> {
        if self.buf.is_empty() {
            Ok(())
        } else {
            Err(malformed("trailing bytes"))
        }
    }
}

#[derive(Default)]
struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn string(mut self, value: &[u8]) -> Self {
        // Blobs are bounded by key sizes, far below u32::MAX.
        self.buf.extend_from_slice(&(value.len() as u32).to_be_bytes());
        self.buf.extend_from_slice(value);
        self
    }

    fn mpint(self, value: &BigUint) -> Self {
        let mut bytes = value.to_bytes_be();
        if bytes == [0] {
            bytes.clear();
        } else if bytes.first().is_some_and(|b| b & 0x80 != 0) {
            bytes.insert(0, 0);
        }
        self.string(&bytes)
    }

    fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

/// Elliptic curves usable with `ecdsa-sha2-*` keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcdsaCurve {
    NistP256,
    NistP384,
    NistP521,
}

impl EcdsaCurve {
    fn from_identifier(id: &str) -> Option<Self> {
        match id {
            "nistp256" => Some(Self::NistP256),
            "nistp384" => Some(Self::NistP384),
            "nistp521" => Some(Self::NistP521),
            _ => None,
        }
    }

    pub fn identifier(&self) -> &'static str {
        match self {
            Self::NistP256 => "nistp256",
            Self::NistP384 => "nistp384",
            Self::NistP521 => "nistp521",
        }
    }

    pub fn key_type(&self) -> &'static str {
        match self {
            Self::NistP256 => ECDSA_NISTP256,
            Self::NistP384 => ECDSA_NISTP384,
            Self::NistP521 => ECDSA_NISTP521,
        }
    }

    /// Length of an uncompressed SEC1 point.
    fn point_length(&self) -> usize {
        match self {
            Self::NistP256 => 65,
            Self::NistP384 => 97,
            Self::NistP521 => 133,
        }
    }
}

/// Public key decoded from its wire form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SshPublicKey {
    Rsa(RsaPublicKey),
    Ed25519([u8; ED25519_KEY_LENGTH]),
    Ecdsa { curve: EcdsaCurve, point: Vec<u8> },
}

impl SshPublicKey {
    /// Decode a wire-encoded public key blob.
    ///
    /// # Errors
    ///
    /// Returns a validation error for malformed blobs and
    /// [`IdentityError::Unsupported`] for unknown key types.
    pub fn from_wire(blob: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(blob);
        let key_type = reader.read_str()?;

        let key = match key_type {
            SSH_RSA => {
                let e = reader.read_mpint()?;
                let n = reader.read_mpint()?;
                let key = RsaPublicKey::new_with_max_size(n, e, RSA_MAX_BITS)
                    .map_err(|err| malformed(&err.to_string()))?;
                Self::Rsa(key)
            }
            SSH_ED25519 => {
                let raw = reader.read_string()?;
                let key = <[u8; ED25519_KEY_LENGTH]>::try_from(raw)
                    .map_err(|_| malformed("ed25519 key must be 32 bytes"))?;
                Self::Ed25519(key)
            }
            ECDSA_NISTP256 | ECDSA_NISTP384 | ECDSA_NISTP521 => {
                let curve = EcdsaCurve::from_identifier(reader.read_str()?)
                    .filter(|curve| curve.key_type() == key_type)
                    .ok_or_else(|| malformed("curve does not match key type"))?;
                let point = reader.read_string()?;
                Self::check_point(curve, point)?;
                Self::Ecdsa {
                    curve,
                    point: point.to_vec(),
                }
            }
            other => return Err(IdentityError::unsupported("key type", other)),
        };

        reader.finish()?;
        Ok(key)
    }

    fn check_point(curve: EcdsaCurve, point: &[u8]) -> Result<()> {
        if point.len() != curve.point_length() || point.first() != Some(&0x04) {
            return Err(malformed("point must be uncompressed"));
        }

        if curve == EcdsaCurve::NistP256 {
            let encoded = p256::EncodedPoint::from_bytes(point)
                .map_err(|_| malformed("invalid P-256 point"))?;
            let key = p256::PublicKey::from_encoded_point(&encoded);
            if Option::<p256::PublicKey>::from(key).is_none() {
                return Err(malformed("point is not on the P-256 curve"));
            }
        }

        Ok(())
    }

    /// Key type as written in authorized key lines.
    pub fn key_type(&self) -> &'static str {
        match self {
            Self::Rsa(_) => SSH_RSA,
            Self::Ed25519(_) => SSH_ED25519,
            Self::Ecdsa { curve, .. } => curve.key_type(),
        }
    }

    /// Encode into wire format.
    pub fn to_wire(&self) -> Vec<u8> {
        let writer = Writer::default().string(self.key_type().as_bytes());
        let writer = match self {
            Self::Rsa(key) => writer.mpint(key.e()).mpint(key.n()),
            Self::Ed25519(raw) => writer.string(raw),
            Self::Ecdsa { curve, point } => writer
                .string(curve.identifier().as_bytes())
                .string(point),
        };
        writer.into_inner()
    }
}

impl From<RsaPublicKey> for SshPublicKey {
    fn from(key: RsaPublicKey) -> Self {
        Self::Rsa(key)
    }
}
