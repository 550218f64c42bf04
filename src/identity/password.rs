//! Password credential records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::{HashAlgorithm, PasswordManager};
use crate::error::Result;

const DEFAULT_PURPOSE: &str = "generic";

/// One version of a user password.
///
/// The plaintext is never kept, only the hash and the parameters needed to
/// verify it later.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Password {
    purpose: String,
    algorithm: HashAlgorithm,
    hash: String,
    cost: u32,
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

impl Password {
    /// Hash `plaintext` into a new active [`Password`].
    ///
    /// # Errors
    ///
    /// Returns `Err` if the hashing primitive fails.
    pub fn new(
        plaintext: &str,
        manager: &PasswordManager,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        Ok(Self {
            purpose: DEFAULT_PURPOSE.to_owned(),
            algorithm: manager.algorithm(),
            hash: manager.hash_password(plaintext)?,
            cost: manager.cost(),
            created_at: now,
            expired: false,
            expired_at: None,
            disabled: false,
            disabled_at: None,
        })
    }

    /// Only a password neither expired nor disabled may be verified.
    #[inline]
    pub fn is_active(&self) -> bool {
        !self.expired && !self.disabled
    }

    /// Check `plaintext` against this record with its own algorithm.
    pub fn verify(&self, plaintext: &str, manager: &PasswordManager) -> bool {
        self.is_active()
            && manager.verify_password(self.algorithm, plaintext, &self.hash)
    }

    /// Mark expired and disabled. Already disabled records keep their
    /// original timestamps.
    pub fn disable(&mut self, now: DateTime<Utc>) {
        if !self.expired {
            self.expired = true;
            self.expired_at = Some(now);
        }
        if !self.disabled {
            self.disabled = true;
            self.disabled_at = Some(now);
        }
    }

    #[inline]
    pub fn purpose(&self) -> &str {
        &self.purpose
    }

    #[inline]
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    #[inline]
    pub fn cost(&self) -> u32 {
        self.cost
    }

    #[inline]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn disabled_at(&self) -> Option<DateTime<Utc>> {
        self.disabled_at
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Password")
            .field("purpose", &self.purpose)
            .field("algorithm", &self.algorithm)
            .field("hash", &"[REDACTED]")
            .field("cost", &self.cost)
            .field("created_at", &self.created_at)
            .field("disabled", &self.disabled)
            .finish()
    }
}
