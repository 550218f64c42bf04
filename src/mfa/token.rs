//! Enrolled multi-factor tokens.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::{RANDOM_ID_LENGTH, random_string};
use crate::error::{IdentityError, Result};
use crate::mfa::totp::{MAX_DIGITS, MIN_DIGITS, TotpParams};
use crate::mfa::webauthn::{MfaDevice, U2fParams, parse_registration};
use crate::request::{MfaTokenRequest, TotpRequest, U2fRequest};

/// Type specific parameters, selected by the `type` tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MfaParams {
    Totp(TotpParams),
    U2f(U2fParams),
}

impl MfaParams {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Totp(_) => "totp",
            Self::U2f(_) => "u2f",
        }
    }
}

/// One enrolled factor.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MfaToken {
    id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    comment: String,
    /// Shared TOTP secret, or the registration challenge for u2f.
    secret: String,
    #[serde(flatten)]
    params: MfaParams,
    created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    expired: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expired_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    disabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    disabled_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    device: Option<MfaDevice>,
}

/// Check that a code sent during enrollment is well-formed.
fn check_code(field: &'static str, code: &str) -> Result<()> {
    let len = code.len();
    if code.is_empty() {
        return Err(IdentityError::invalid(field, "", "code is empty"));
    }
    if !(MIN_DIGITS as usize..=MAX_DIGITS as usize).contains(&len) {
        return Err(IdentityError::invalid(
            field,
            code,
            format!("code must be {MIN_DIGITS}-{MAX_DIGITS} characters"),
        ));
    }
    Ok(())
}

impl MfaToken {
    /// Build a token from an enrollment request.
    ///
    /// TOTP enrollment requires two consecutive codes: `code1` must be valid
    /// one period ago and `code2` now. Neither is stored.
    ///
    /// # Errors
    ///
    /// Returns `Err` with a validation error when parameters or codes are
    /// invalid and [`IdentityError::Unsupported`] for unsupported WebAuthn
    /// keys.
    pub fn enroll(
        request: &MfaTokenRequest,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let mut token = match request {
            MfaTokenRequest::Totp(totp) => Self::enroll_totp(totp, now)?,
            MfaTokenRequest::U2f(u2f) => Self::enroll_u2f(u2f, now)?,
        };

        if request.disabled() {
            token.disable(now);
        }

        Ok(token)
    }

    fn new(
        comment: &str,
        secret: &str,
        params: MfaParams,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: random_string(RANDOM_ID_LENGTH),
            comment: comment.trim().to_owned(),
            secret: secret.to_owned(),
            params,
            created_at: now,
            expired: false,
            expired_at: None,
            disabled: false,
            disabled_at: None,
            device: None,
        }
    }

    fn enroll_totp(request: &TotpRequest, now: DateTime<Utc>) -> Result<Self> {
        if request.secret.is_empty() {
            return Err(IdentityError::invalid("secret", "", "secret is empty"));
        }

        let params = TotpParams::from_text(
            request.algorithm.as_deref(),
            request.period.as_deref(),
            request.digits.as_deref(),
        )?;

        let code1 = request.code1.trim();
        let code2 = request.code2.trim();
        check_code("code1", code1)?;
        check_code("code2", code2)?;
        if code1 == code2 {
            return Err(IdentityError::invalid(
                "code2",
                code2,
                "code 1 and 2 match",
            ));
        }
        if code1.len() != code2.len() {
            return Err(IdentityError::invalid(
                "code2",
                code2,
                "code 1 and 2 have different length",
            ));
        }

        let secret = request.secret.as_bytes();
        let period = TimeDelta::seconds(params.period() as i64);
        let earlier = (now - period).timestamp();
        if !params.validate_at(secret, code1, earlier) {
            return Err(IdentityError::invalid(
                "code1",
                code1,
                "code is invalid",
            ));
        }
        if !params.validate_at(secret, code2, now.timestamp()) {
            return Err(IdentityError::invalid(
                "code2",
                code2,
                "code is invalid",
            ));
        }

        Ok(Self::new(
            &request.comment,
            &request.secret,
            MfaParams::Totp(params),
            now,
        ))
    }

    fn enroll_u2f(request: &U2fRequest, now: DateTime<Utc>) -> Result<Self> {
        if request.challenge.trim().is_empty() {
            return Err(IdentityError::invalid(
                "webauthn_challenge",
                "",
                "challenge not found",
            ));
        }

        let registration = parse_registration(&request.register)?;
        let mut token = Self::new(
            &request.comment,
            request.challenge.trim(),
            MfaParams::U2f(registration.params),
            now,
        );
        token.device = registration.device;

        Ok(token)
    }

    /// Validate a passcode at `timestamp`. Always fails for u2f tokens
    /// and for inactive tokens.
    pub fn validate_code_at(&self, code: &str, timestamp: i64) -> bool {
        match &self.params {
            MfaParams::Totp(params) if self.is_active() => {
                params.validate_at(self.secret.as_bytes(), code, timestamp)
            }
            _ => false,
        }
    }

    /// Disabled is terminal.
    pub fn disable(&mut self, now: DateTime<Utc>) {
        if !self.disabled {
            self.expired = true;
            self.expired_at = Some(now);
            self.disabled = true;
            self.disabled_at = Some(now);
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        !self.disabled && !self.expired
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// `totp` or `u2f`.
    #[inline]
    pub fn kind(&self) -> &'static str {
        self.params.kind()
    }

    #[inline]
    pub fn comment(&self) -> &str {
        &self.comment
    }

    #[inline]
    pub fn params(&self) -> &MfaParams {
        &self.params
    }

    pub fn device(&self) -> Option<&MfaDevice> {
        self.device.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub(crate) fn secret(&self) -> &str {
        &self.secret
    }
}

impl std::fmt::Debug for MfaToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MfaToken")
            .field("id", &self.id)
            .field("comment", &self.comment)
            .field("secret", &"[REDACTED]")
            .field("params", &self.params)
            .field("disabled", &self.disabled)
            .finish()
    }
}

/// MFA capabilities of a user, derived from active tokens.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MfaFlags {
    pub configured: bool,
    /// An authenticator app (totp) is enrolled.
    pub app: bool,
    /// A security key (u2f) is enrolled.
    pub universal: bool,
}

impl MfaFlags {
    pub fn from_tokens<'a>(
        tokens: impl IntoIterator<Item = &'a MfaToken>,
    ) -> Self {
        tokens
            .into_iter()
            .filter(|token| token.is_active())
            .fold(Self::default(), |mut flags, token| {
                flags.configured = true;
                match token.params {
                    MfaParams::Totp(_) => flags.app = true,
                    MfaParams::U2f(_) => flags.universal = true,
                }
                flags
            })
    }
}
