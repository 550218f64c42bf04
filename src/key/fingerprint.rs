//! Public key fingerprints.

use base64ct::{Base64Unpadded, Encoding};
use md5::Md5;
use sha2::{Digest, Sha256};

use crate::key::ssh::SshPublicKey;

/// Both fingerprints of one parsed key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprints {
    /// Legacy colon separated MD5 (`ff:ae:...`).
    pub md5: String,
    /// Unpadded base64 SHA-256, without the `SHA256:` prefix.
    pub sha256: String,
}

impl Fingerprints {
    /// Compute from the wire encoding of `key`.
    pub fn of(key: &SshPublicKey) -> Self {
        let blob = key.to_wire();

        let md5 = Md5::digest(&blob)
            .iter()
            .map(|b| hex::encode([*b]))
            .collect::<Vec<_>>()
            .join(":");
        let sha256 = Base64Unpadded::encode_string(&Sha256::digest(&blob));

        Self { md5, sha256 }
    }
}
