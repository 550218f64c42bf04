//! Public key subsystem.

pub mod fingerprint;
pub mod public_key;
pub mod ssh;

pub use fingerprint::Fingerprints;
pub use public_key::{KeyUsage, PublicKey};
pub use ssh::SshPublicKey;

#[cfg(test)]
pub(crate) mod tests {
    //! Keys generated with `ssh-keygen` and converted with
    //! `ssh-keygen -e -m PEM` and `-m PKCS8`.

    pub(crate) const RSA_LINE: &str = "ssh-rsa AAAAB3NzaC1yc2EAAAADAQABAAABAQCZv0AR61fObXMGOGF8HWvOA4WGMnJIFr6aHvrwFC3qeUkUTtjg+NBADbShhn3jxIfSOd1nqi0FL7BZ7cL8Q0kzZ27dwnRROV8Ue90IcnqEdHdj7pr4J/GqyjRalCneG2434yuiZ+O4bf2RtCvCXQg8Qbtxyt9tjfs+kYHYuieavPAEpQmm36oZRHA3n90flhyhnCuuFD6wba9hjlemOJGobjXGFApE/DJJlaw73K+LDMAiwim6siLoi/95ZPGGQFRDncKZDJqDCnmvZMuogyDRWSPn7MjRAnk0XMEf5NfiVCtlT1MFiGt2Ta8cC06p2W5pYAbIw+X2BIQnULHbQ2nt jsmith@example.com";
    pub(crate) const RSA_MD5: &str = "ff:ae:85:bc:d7:6a:cc:9f:17:59:a9:57:d5:84:4b:1c";
    pub(crate) const RSA_SHA256: &str = "ihVPsR2kJZjI5Nn6be6v/dNEzRFhfL0ObAe9w6WiBus";

    pub(crate) const RSA_PKCS1_PEM: &str = "-----BEGIN RSA PUBLIC KEY-----
MIIBCgKCAQEAmb9AEetXzm1zBjhhfB1rzgOFhjJySBa+mh768BQt6nlJFE7Y4PjQ
QA20oYZ948SH0jndZ6otBS+wWe3C/ENJM2du3cJ0UTlfFHvdCHJ6hHR3Y+6a+Cfx
qso0WpQp3htuN+MromfjuG39kbQrwl0IPEG7ccrfbY37PpGB2LonmrzwBKUJpt+q
GURwN5/dH5YcoZwrrhQ+sG2vYY5XpjiRqG41xhQKRPwySZWsO9yviwzAIsIpurIi
6Iv/eWTxhkBUQ53CmQyagwp5r2TLqIMg0Vkj5+zI0QJ5NFzBH+TX4lQrZU9TBYhr
dk2vHAtOqdluaWAGyMPl9gSEJ1Cx20Np7QIDAQAB
-----END RSA PUBLIC KEY-----
";

    /// SubjectPublicKeyInfo DER under the `RSA PUBLIC KEY` label.
    pub(crate) const RSA_SPKI_PEM: &str = "-----BEGIN RSA PUBLIC KEY-----
MIIBIjANBgkqhkiG9w0BAQEFAAOCAQ8AMIIBCgKCAQEAmb9AEetXzm1zBjhhfB1r
zgOFhjJySBa+mh768BQt6nlJFE7Y4PjQQA20oYZ948SH0jndZ6otBS+wWe3C/ENJ
M2du3cJ0UTlfFHvdCHJ6hHR3Y+6a+Cfxqso0WpQp3htuN+MromfjuG39kbQrwl0I
PEG7ccrfbY37PpGB2LonmrzwBKUJpt+qGURwN5/dH5YcoZwrrhQ+sG2vYY5XpjiR
qG41xhQKRPwySZWsO9yviwzAIsIpurIi6Iv/eWTxhkBUQ53CmQyagwp5r2TLqIMg
0Vkj5+zI0QJ5NFzBH+TX4lQrZU9TBYhrdk2vHAtOqdluaWAGyMPl9gSEJ1Cx20Np
7QIDAQAB
-----END RSA PUBLIC KEY-----
";

    pub(crate) const ED25519_LINE: &str = "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAICOVla2LL8dUyUITDfiA4wkIC1XbIp7+6G5+w0nj9Gtv laptop";
    pub(crate) const ED25519_MD5: &str = "a1:b4:70:a6:2f:1d:0e:b6:51:ae:d6:d2:8f:d7:80:fa";
    pub(crate) const ED25519_SHA256: &str = "8bizN2mhI7bqYFbr4Xg/v9/5t2sWxrUVJS2uIeUHWGc";

    pub(crate) const ECDSA_LINE: &str = "ecdsa-sha2-nistp256 AAAAE2VjZHNhLXNoYTItbmlzdHAyNTYAAAAIbmlzdHAyNTYAAABBBASUecPpkXipXr4w1M/NGB26g+kqSas2XQNNtxFJQibWvvjE4aEYfcbAAqFPTw+Y9XRelanr5EegLaPzc0i55fA= yubikey";
    pub(crate) const ECDSA_MD5: &str = "97:2b:c0:5c:eb:a4:d7:dd:92:fa:69:2f:71:a5:9b:f4";
    pub(crate) const ECDSA_SHA256: &str = "qdn8xk6V0hWGF7vRVLxgL2kuQuGTtTkqc5xCkmxNUc4";
}
