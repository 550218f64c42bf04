//! Typed operation parameters.
//!
//! Each credential operation takes one variant per credential type so that
//! combinations such as a TOTP period on a security key cannot be built.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Candidate user for [`crate::Database::add_user`].
#[derive(Clone, Default, Serialize, Deserialize, Validate)]
pub struct NewUser {
    #[validate(length(min = 1))]
    pub username: String,
    #[validate(length(min = 1))]
    pub password: String,
    #[validate(email)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl NewUser {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            email: email.into(),
            ..Default::default()
        }
    }

    pub fn full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = Some(full_name.into());
        self
    }

    pub fn roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }
}

impl std::fmt::Debug for NewUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewUser")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("email", &self.email)
            .field("full_name", &self.full_name)
            .field("roles", &self.roles)
            .finish()
    }
}

/// Public key material and its metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySpec {
    /// PEM block or OpenSSH authorized key line.
    pub payload: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub disabled: bool,
}

impl KeySpec {
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            ..Default::default()
        }
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }
}

/// Public key to attach to a user, by usage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "usage", rename_all = "lowercase")]
pub enum KeyRequest {
    Ssh(KeySpec),
    Gpg(KeySpec),
}

impl KeyRequest {
    pub fn spec(&self) -> &KeySpec {
        match self {
            Self::Ssh(spec) | Self::Gpg(spec) => spec,
        }
    }
}

/// TOTP enrollment.
///
/// Numeric parameters arrive as text and are parsed during enrollment.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct TotpRequest {
    #[serde(default)]
    pub comment: String,
    pub secret: String,
    #[serde(default)]
    pub algorithm: Option<String>,
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default)]
    pub digits: Option<String>,
    /// Code of the previous period.
    pub code1: String,
    /// Code of the current period.
    pub code2: String,
    #[serde(default)]
    pub disabled: bool,
}

impl std::fmt::Debug for TotpRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TotpRequest")
            .field("comment", &self.comment)
            .field("secret", &"[REDACTED]")
            .field("algorithm", &self.algorithm)
            .field("period", &self.period)
            .field("digits", &self.digits)
            .finish()
    }
}

/// WebAuthn security key enrollment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct U2fRequest {
    #[serde(default)]
    pub comment: String,
    /// Base64 JSON registration payload.
    pub register: String,
    pub challenge: String,
    #[serde(default)]
    pub disabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MfaTokenRequest {
    Totp(TotpRequest),
    U2f(U2fRequest),
}

impl MfaTokenRequest {
    /// Enroll the token already disabled.
    pub fn disabled(&self) -> bool {
        match self {
            Self::Totp(totp) => totp.disabled,
            Self::U2f(u2f) => u2f.disabled,
        }
    }
}
